//! 轮询 Worker 池
//!
//! 固定数量的 Worker 从有界队列中取任务，每次调用积分计算系统前都要先从共享的
//! [`RateGate`] 获取许可。每个任务携带自己的结果通道，结果只会送达订阅了该任务的
//! 句柄。
//!
//! 同一订单同一时刻只有一个在途任务：后来的提交方订阅已有任务的结果，不会重复入队。
//!
//! 429 和"尚未计算完成"不会让 Worker 原地等待：任务在延迟后重新入队，Worker 立即
//! 处理下一个任务；重新入队的任务仍需经过限速门。尝试次数达到上限后发布非致命失败。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use loyalty_shared::config::AccrualConfig;
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PoolError;
use crate::gateway::AccrualGateway;
use crate::ledger::BalanceLedger;
use crate::models::{FailureKind, OrderNumber, Outcome, PollTask};
use crate::processor::{AccrualProcessor, Attempt};
use crate::rate_gate::RateGate;

/// Worker 池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub max_requests_per_minute: u32,
    pub queue_capacity: usize,
    /// 单个任务最多调用积分计算系统的次数（含首次）
    pub max_attempts: u32,
    /// 订单尚未计算完成时的退避策略
    pub pending_backoff: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&AccrualConfig::default())
    }
}

impl From<&AccrualConfig> for PoolConfig {
    fn from(config: &AccrualConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            max_requests_per_minute: config.max_requests_per_minute,
            queue_capacity: config.queue_capacity.max(1),
            max_attempts: config.max_attempts.max(1),
            pending_backoff: RetryPolicy::with_initial_delay(Duration::from_millis(
                config.pending_backoff_ms,
            )),
        }
    }
}

/// 在途任务表：订单号 → 结果通道
type InFlight = DashMap<OrderNumber, Slot>;

struct Slot {
    id: u64,
    sender: broadcast::Sender<Outcome>,
}

/// 在途登记，发布结果或任务被丢弃时注销
struct Ticket {
    id: u64,
    order_number: OrderNumber,
    in_flight: Arc<InFlight>,
}

impl Ticket {
    /// 注销并取出结果通道；只会移除自己登记的条目
    fn take(&self) -> Option<broadcast::Sender<Outcome>> {
        self.in_flight
            .remove_if(&self.order_number, |_, slot| slot.id == self.id)
            .map(|(_, slot)| slot.sender)
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        // 未发布即被丢弃时关闭通道，等待方得到 Abandoned
        self.take();
    }
}

/// 队列中的任务
struct Job {
    task: PollTask,
    /// 已完成的尝试次数
    attempts: u32,
    ticket: Ticket,
}

impl Job {
    fn publish(self, outcome: Outcome) {
        metrics::record_accrual_poll(outcome.label());
        if let Some(sender) = self.ticket.take() {
            // 请求方可能已超时离开，结果直接丢弃
            let _ = sender.send(outcome);
        }
    }
}

/// 单个任务的结果句柄
pub struct PollHandle {
    order_number: OrderNumber,
    receiver: broadcast::Receiver<Outcome>,
}

impl PollHandle {
    pub fn order_number(&self) -> OrderNumber {
        self.order_number
    }

    /// 等待任务结果
    ///
    /// Worker 在发布结果前丢弃任务时返回 `Failure{Abandoned}`。
    pub async fn wait(mut self) -> Outcome {
        let order_number = self.order_number;
        self.receiver.recv().await.unwrap_or_else(|_| {
            Outcome::failure(order_number, FailureKind::Abandoned, "任务未发布结果即被丢弃")
        })
    }
}

/// 轮询 Worker 池
///
/// 丢弃池即关闭队列，Worker 处理完队列中剩余任务后退出。
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    gate: Arc<RateGate>,
    in_flight: Arc<InFlight>,
    next_id: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 创建并启动 Worker，必须在 tokio 运行时内调用
    pub fn new(
        config: PoolConfig,
        gateway: Arc<dyn AccrualGateway>,
        ledger: Arc<dyn BalanceLedger>,
    ) -> Self {
        let gate = Arc::new(RateGate::per_minute(config.max_requests_per_minute));
        Self::with_gate(config, gate, Arc::new(AccrualProcessor::new(gateway, ledger)))
    }

    /// 使用外部提供的限速门创建
    pub fn with_gate(config: PoolConfig, gate: Arc<RateGate>, processor: Arc<AccrualProcessor>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    receiver: receiver.clone(),
                    requeue: sender.downgrade(),
                    gate: gate.clone(),
                    processor: processor.clone(),
                    max_attempts: config.max_attempts.max(1),
                    pending_backoff: config.pending_backoff.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            max_requests_per_minute = config.max_requests_per_minute,
            period_ms = gate.period().as_millis() as u64,
            "积分轮询 Worker 池已启动"
        );

        Self {
            sender,
            gate,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            workers,
        }
    }

    /// 提交任务，队列满时等待空位
    ///
    /// 订单已有在途任务（排队中、处理中或等待重新入队）时直接订阅其结果，
    /// 不再入队。
    pub async fn submit(&self, task: PollTask) -> Result<PollHandle, PoolError> {
        let order_number = task.order_number;

        let (receiver, ticket) = match self.in_flight.entry(order_number) {
            Entry::Occupied(entry) => {
                debug!(order = order_number, "订单已有在途任务，共享其结果");
                return Ok(PollHandle {
                    order_number,
                    receiver: entry.get().sender.subscribe(),
                });
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = broadcast::channel(1);
                entry.insert(Slot { id, sender });
                let ticket = Ticket {
                    id,
                    order_number,
                    in_flight: self.in_flight.clone(),
                };
                (receiver, ticket)
            }
        };

        // 发送失败时任务连同登记一起被丢弃
        self.sender
            .send(Job {
                task,
                attempts: 0,
                ticket,
            })
            .await
            .map_err(|_| PoolError::Closed)?;

        metrics::set_queue_depth(self.sender.max_capacity() - self.sender.capacity());

        Ok(PollHandle {
            order_number,
            receiver,
        })
    }

    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    /// 在途任务数
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// 关闭队列并等待所有 Worker 退出
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Worker 异常退出");
            }
        }
        info!("积分轮询 Worker 池已关闭");
    }
}

struct Worker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    /// 弱引用，不阻止池关闭队列
    requeue: mpsc::WeakSender<Job>,
    gate: Arc<RateGate>,
    processor: Arc<AccrualProcessor>,
    max_attempts: u32,
    pending_backoff: RetryPolicy,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "Worker 已启动");

        loop {
            let job = { self.receiver.lock().await.recv().await };
            let Some(mut job) = job else {
                break;
            };

            self.gate.acquire().await;
            let attempt = self.processor.process(&job.task).await;
            job.attempts += 1;

            match attempt {
                Attempt::Done(outcome) => job.publish(outcome),
                Attempt::RateLimited { retry_after } => {
                    self.gate.defer(retry_after);
                    if job.attempts < self.max_attempts {
                        self.requeue(job, retry_after);
                    } else {
                        let order_number = job.task.order_number;
                        job.publish(Outcome::failure(
                            order_number,
                            FailureKind::RateLimited,
                            format!("连续 {} 次被限流", self.max_attempts),
                        ));
                    }
                }
                Attempt::NotYetAvailable { detail } => {
                    if job.attempts < self.max_attempts {
                        let delay = self.pending_backoff.delay_for_attempt(job.attempts - 1);
                        self.requeue(job, delay);
                    } else {
                        let order_number = job.task.order_number;
                        job.publish(Outcome::failure(
                            order_number,
                            FailureKind::NotYetAvailable,
                            detail,
                        ));
                    }
                }
            }
        }

        debug!(worker = self.id, "Worker 已退出");
    }

    /// 延迟后重新入队，不占用 Worker
    fn requeue(&self, job: Job, delay: Duration) {
        debug!(
            worker = self.id,
            order = job.task.order_number,
            attempts = job.attempts,
            delay_ms = delay.as_millis() as u64,
            "任务延迟后重新入队"
        );

        let requeue = self.requeue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(sender) = requeue.upgrade() else {
                abandon(job);
                return;
            };
            if let Err(mpsc::error::SendError(job)) = sender.send(job).await {
                abandon(job);
            }
        });
    }
}

fn abandon(job: Job) {
    let order_number = job.task.order_number;
    job.publish(Outcome::failure(
        order_number,
        FailureKind::Abandoned,
        "Worker 池已关闭",
    ));
}
