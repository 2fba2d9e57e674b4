//! 单次积分查询与入账
//!
//! 处理器只负责一次尝试：调用积分计算系统，把终态结果写入账本。
//! 是否重新入队由 Worker 池根据返回的 [`Attempt`] 决定。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::observability::metrics;
use tracing::{debug, info, instrument, warn};

use crate::error::GatewayError;
use crate::gateway::{AccrualGateway, AccrualReply};
use crate::ledger::{BalanceLedger, CreditResult};
use crate::models::{FailureKind, OrderStatus, Outcome, Points, PollTask};

/// 一次尝试的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// 已得到最终结果
    Done(Outcome),
    /// 收到 429，需等待 `retry_after` 后再试
    RateLimited { retry_after: Duration },
    /// 订单仍在计算中或尚未登记
    NotYetAvailable { detail: String },
}

/// 积分查询处理器
pub struct AccrualProcessor {
    gateway: Arc<dyn AccrualGateway>,
    ledger: Arc<dyn BalanceLedger>,
}

impl AccrualProcessor {
    pub fn new(gateway: Arc<dyn AccrualGateway>, ledger: Arc<dyn BalanceLedger>) -> Self {
        Self { gateway, ledger }
    }

    /// 执行一次查询
    #[instrument(skip(self, task), fields(user = %task.user_key, order = task.order_number))]
    pub async fn process(&self, task: &PollTask) -> Attempt {
        let order_number = task.order_number;

        let reply = match self.gateway.fetch(order_number).await {
            Ok(reply) => reply,
            Err(GatewayError::UnexpectedResponse(detail)) => {
                warn!(%detail, "积分计算系统响应无法解析");
                return Attempt::Done(Outcome::failure(
                    order_number,
                    FailureKind::UnexpectedResponse,
                    detail,
                ));
            }
            Err(e) => {
                warn!(error = %e, "积分计算系统调用失败");
                return Attempt::Done(Outcome::failure(
                    order_number,
                    FailureKind::GatewayUnreachable,
                    e.to_string(),
                ));
            }
        };

        match reply {
            AccrualReply::Credited { status, accrual } => {
                Attempt::Done(self.settle(task, status, accrual).await)
            }
            AccrualReply::Pending { status } => {
                if let Err(e) = self
                    .ledger
                    .update_order(order_number, OrderStatus::Processing, Points::ZERO)
                    .await
                {
                    warn!(error = %e, "订单状态更新失败");
                    return Attempt::Done(Outcome::failure(
                        order_number,
                        FailureKind::LedgerUpdateFailed,
                        e.to_string(),
                    ));
                }
                Attempt::NotYetAvailable {
                    detail: format!("积分计算中: {status:?}"),
                }
            }
            AccrualReply::Unknown => Attempt::NotYetAvailable {
                detail: "订单未在积分计算系统登记".to_string(),
            },
            AccrualReply::RateLimited { retry_after } => {
                metrics::record_rate_limited(retry_after);
                info!(retry_after_secs = retry_after.as_secs(), "积分计算系统限流");
                Attempt::RateLimited { retry_after }
            }
            AccrualReply::Unavailable { status } => Attempt::Done(Outcome::failure(
                order_number,
                FailureKind::GatewayUnreachable,
                format!("积分计算系统返回状态码 {status}"),
            )),
        }
    }

    /// 终态结果入账并记录订单状态
    async fn settle(&self, task: &PollTask, status: OrderStatus, accrual: Points) -> Outcome {
        let order_number = task.order_number;

        if !accrual.is_zero() {
            match self
                .ledger
                .credit_once(&task.user_key, order_number, accrual)
                .await
            {
                Ok(CreditResult::Credited) => {
                    metrics::record_credit(accrual.hundredths());
                    info!(accrual = %accrual, "订单积分已入账");
                }
                Ok(CreditResult::AlreadyCredited) => {
                    debug!("订单积分此前已入账");
                }
                Err(e) => {
                    warn!(error = %e, "订单积分入账失败");
                    return Outcome::failure(
                        order_number,
                        FailureKind::LedgerUpdateFailed,
                        e.to_string(),
                    );
                }
            }
        }

        if let Err(e) = self.ledger.update_order(order_number, status, accrual).await {
            warn!(error = %e, "订单状态更新失败");
            return Outcome::failure(order_number, FailureKind::LedgerUpdateFailed, e.to_string());
        }

        Outcome::Success {
            order_number,
            status,
            accrual,
        }
    }
}
