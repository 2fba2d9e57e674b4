//! 积分计算系统客户端
//!
//! 通过 `AccrualGateway` trait 抽象 HTTP 调用，测试时可注入 mock 实现。
//! 响应按状态码归类为 [`AccrualReply`] 的各个分支，网络错误和无法解析的响应体
//! 以 [`GatewayError`] 返回。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use loyalty_shared::observability::metrics;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::models::{AccrualStatus, OrderNumber, OrderStatus, Points};

/// 缺少或无法解析 `Retry-After` 时的等待时间
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// 积分计算系统对单个订单的答复
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualReply {
    /// 计算已结束（PROCESSED 或 INVALID）
    Credited { status: OrderStatus, accrual: Points },
    /// 已登记或计算中
    Pending { status: AccrualStatus },
    /// 订单未在积分计算系统登记（204/404）
    Unknown,
    /// 超出请求配额（429）
    RateLimited { retry_after: Duration },
    /// 约定之外的状态码
    Unavailable { status: u16 },
}

impl AccrualReply {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Credited { .. } => "credited",
            Self::Pending { .. } => "pending",
            Self::Unknown => "unknown",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// 积分计算系统调用接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualGateway: Send + Sync {
    /// 查询单个订单的积分计算结果
    async fn fetch(&self, order_number: OrderNumber) -> Result<AccrualReply, GatewayError>;
}

/// `GET /api/orders/{number}` 的响应体
#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: AccrualStatus,
    #[serde(default)]
    accrual: Option<Points>,
}

/// 基于 reqwest 的积分计算系统客户端
#[derive(Clone)]
pub struct HttpAccrualGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualGateway {
    /// 创建客户端，`base_url` 需包含协议前缀
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(GatewayError::InvalidAddress(base_url));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        info!(base_url = %base_url, "积分计算系统客户端已初始化");

        Ok(Self { client, base_url })
    }

    fn order_url(&self, order_number: OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }
}

#[async_trait]
impl AccrualGateway for HttpAccrualGateway {
    async fn fetch(&self, order_number: OrderNumber) -> Result<AccrualReply, GatewayError> {
        let start = Instant::now();
        let response = self.client.get(self.order_url(order_number)).send().await?;
        let status = response.status();

        let reply = match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                parse_order_body(order_number, &body)?
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => AccrualReply::Unknown,
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(parse_retry_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                AccrualReply::RateLimited { retry_after }
            }
            other => {
                warn!(order_number, status = other.as_u16(), "积分计算系统返回非预期状态码");
                AccrualReply::Unavailable {
                    status: other.as_u16(),
                }
            }
        };

        metrics::record_gateway_latency(reply.label(), start.elapsed().as_secs_f64());
        debug!(order_number, reply = reply.label(), "积分计算系统已答复");

        Ok(reply)
    }
}

/// 解析 200 响应体
fn parse_order_body(order_number: OrderNumber, body: &[u8]) -> Result<AccrualReply, GatewayError> {
    let parsed: AccrualResponse = serde_json::from_slice(body)
        .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

    if parsed.order.trim().parse::<OrderNumber>().ok() != Some(order_number) {
        return Err(GatewayError::UnexpectedResponse(format!(
            "响应订单号 {} 与请求订单号 {} 不一致",
            parsed.order, order_number
        )));
    }

    if parsed.status.is_terminal() {
        Ok(AccrualReply::Credited {
            status: parsed.status.to_order_status(),
            accrual: parsed.accrual.unwrap_or(Points::ZERO),
        })
    } else {
        Ok(AccrualReply::Pending {
            status: parsed.status,
        })
    }
}

/// 解析 `Retry-After` 秒数，非法值退化为默认等待时间
pub fn parse_retry_after(value: &str) -> Duration {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
