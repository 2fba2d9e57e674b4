//! 请求级结果汇总
//!
//! 为一个 HTTP 请求的所有待处理订单各提交一个任务，只等待自己提交的句柄，
//! 与同时在处理的其他请求互不干扰。等待时间以 `poll_timeout` 为上限，
//! 超时后尚未返回的订单按非致命失败处理，任务继续在后台运行。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use loyalty_shared::config::AccrualConfig;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, warn};

use crate::error::CorrelateError;
use crate::models::{FailureKind, OrderNumber, Outcome, PollTask};
use crate::pool::{PollHandle, WorkerPool};

/// 请求级结果汇总器
#[derive(Clone)]
pub struct RequestCorrelator {
    pool: Arc<WorkerPool>,
    poll_timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(pool: Arc<WorkerPool>, poll_timeout: Duration) -> Self {
        Self { pool, poll_timeout }
    }

    pub fn from_config(pool: Arc<WorkerPool>, config: &AccrualConfig) -> Self {
        Self::new(pool, Duration::from_secs(config.poll_timeout_seconds))
    }

    /// 提交单个订单的轮询任务，不等待结果
    pub async fn submit(&self, user_key: &str, order_number: OrderNumber) -> Result<PollHandle, CorrelateError> {
        Ok(self.pool.submit(PollTask::new(user_key, order_number)).await?)
    }

    /// 轮询用户的一批订单，返回按订单号索引的结果
    ///
    /// 遇到第一个致命失败立即返回错误，其余句柄随之丢弃；非致命失败照常放入结果。
    /// 超过 `poll_timeout` 仍未返回的订单记为 `NotYetAvailable`。
    #[instrument(skip(self, orders), fields(orders = orders.len()))]
    pub async fn poll_orders(
        &self,
        user_key: &str,
        orders: &[OrderNumber],
    ) -> Result<HashMap<OrderNumber, Outcome>, CorrelateError> {
        let deadline = Instant::now() + self.poll_timeout;
        let orders: BTreeSet<OrderNumber> = orders.iter().copied().collect();

        let mut pending = FuturesUnordered::new();
        for &order_number in &orders {
            // 队列满时的等待同样受截止时间约束
            match timeout_at(deadline, self.submit(user_key, order_number)).await {
                Ok(handle) => pending.push(handle?.wait()),
                Err(_) => break,
            }
        }

        let mut outcomes = HashMap::with_capacity(orders.len());
        while let Ok(Some(outcome)) = timeout_at(deadline, pending.next()).await {
            match outcome {
                Outcome::Failure {
                    order_number,
                    kind,
                    detail,
                } if kind.is_fatal() => {
                    warn!(order = order_number, %kind, %detail, "订单轮询致命失败");
                    return Err(CorrelateError::Fatal {
                        order_number,
                        kind,
                        detail,
                    });
                }
                outcome => {
                    outcomes.insert(outcome.order_number(), outcome);
                }
            }
        }

        // 截止时间已到，未完成的订单保留当前状态，任务继续在后台运行
        let unfinished: Vec<OrderNumber> = orders
            .iter()
            .copied()
            .filter(|order_number| !outcomes.contains_key(order_number))
            .collect();
        if !unfinished.is_empty() {
            warn!(
                unfinished = unfinished.len(),
                timeout_ms = self.poll_timeout.as_millis() as u64,
                "等待轮询结果超时"
            );
            for order_number in unfinished {
                outcomes.insert(
                    order_number,
                    Outcome::failure(
                        order_number,
                        FailureKind::NotYetAvailable,
                        "等待超时，任务仍在后台处理",
                    ),
                );
            }
        }

        debug!(
            succeeded = outcomes.values().filter(|o| o.is_success()).count(),
            total = outcomes.len(),
            "订单轮询完成"
        );

        Ok(outcomes)
    }
}
