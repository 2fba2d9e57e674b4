//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出，
//! 指标通过独立端口的 `/metrics` 暴露。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// 全局 Prometheus handle
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标服务器句柄
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 安装 Prometheus recorder 并在 `port` 上启动 `/metrics` 端点
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    metrics::describe_counter!(
        "accrual_polls_total",
        "Accrual poll tasks finished, by outcome"
    );
    metrics::describe_counter!("accrual_credits_total", "Order accruals credited to balances");
    metrics::describe_counter!(
        "accrual_rate_limited_total",
        "429 responses received from the accrual system"
    );
    metrics::describe_histogram!(
        "accrual_gateway_duration_seconds",
        "Accrual system request latency in seconds"
    );
    metrics::describe_gauge!("accrual_queue_depth", "Poll tasks waiting in the queue");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    }))
}

/// 获取全局 Prometheus handle
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次轮询任务的最终结果（`success` 或失败类型）
#[inline]
pub fn record_accrual_poll(outcome: &'static str) {
    metrics::counter!("accrual_polls_total", "outcome" => outcome).increment(1);
}

/// 记录一次余额入账
#[inline]
pub fn record_credit(points: i64) {
    metrics::counter!("accrual_credits_total").increment(1);
    metrics::counter!("accrual_credited_points_total").increment(points.max(0) as u64);
}

/// 记录一次 429
#[inline]
pub fn record_rate_limited(retry_after: Duration) {
    metrics::counter!("accrual_rate_limited_total").increment(1);
    metrics::histogram!("accrual_retry_after_seconds").record(retry_after.as_secs_f64());
}

/// 记录积分计算系统调用耗时
#[inline]
pub fn record_gateway_latency(reply: &'static str, duration_secs: f64) {
    metrics::histogram!("accrual_gateway_duration_seconds", "reply" => reply)
        .record(duration_secs);
}

/// 更新队列积压
#[inline]
pub fn set_queue_depth(depth: usize) {
    metrics::gauge!("accrual_queue_depth").set(depth as f64);
}
