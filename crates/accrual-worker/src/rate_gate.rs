//! 全局限速门
//!
//! 按固定间隔 `60s / max_requests_per_minute` 逐个发放许可，所有 Worker 共享同一个实例，
//! 因此对外请求的总速率与 Worker 数量无关。空闲期间不累积许可。

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// 全局限速门
#[derive(Debug)]
pub struct RateGate {
    period: Duration,
    /// 下一个可用许可的时刻
    next_slot: Mutex<Instant>,
}

impl RateGate {
    /// 按固定间隔发放许可
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// 按每分钟最大请求数构造
    pub fn per_minute(max_requests_per_minute: u32) -> Self {
        Self::new(Duration::from_secs(60) / max_requests_per_minute.max(1))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 等待下一个许可
    ///
    /// 先在锁内预订时间槽，再在锁外等待，等待期间不阻塞其他调用方预订后续时间槽。
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let slot = (*next).max(Instant::now());
            *next = slot + self.period;
            slot
        };
        sleep_until(slot).await;
    }

    /// 将下一个许可推迟到至少 `delay` 之后
    ///
    /// 收到 429 时调用，整个进程一起遵守 `Retry-After`。
    pub fn defer(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut next = self.next_slot.lock();
        if until > *next {
            *next = until;
            debug!(delay_ms = delay.as_millis() as u64, "限速门已推迟");
        }
    }
}
