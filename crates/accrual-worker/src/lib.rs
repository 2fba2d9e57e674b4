//! 积分轮询核心
//!
//! HTTP 层为每个待处理订单提交一个 [`PollTask`]，由固定数量的 Worker 在全局限速门
//! （[`RateGate`]）的约束下查询积分计算系统，将结果幂等地记入余额账本，
//! 并通过每个任务独立的 [`PollHandle`] 把 [`Outcome`] 交还给提交方。
//!
//! ```text
//! RequestCorrelator ──submit──▶ WorkerPool ──acquire──▶ RateGate
//!        ▲                          │
//!        │                          ├──fetch──▶ AccrualGateway
//!        └──────── Outcome ─────────┴──credit─▶ BalanceLedger
//! ```

pub mod correlator;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod pool;
pub mod processor;
pub mod rate_gate;

pub use correlator::RequestCorrelator;
pub use error::{CorrelateError, GatewayError, LedgerError, PoolError};
pub use gateway::{AccrualGateway, AccrualReply, HttpAccrualGateway};
pub use ledger::{BalanceLedger, CreditResult, MemoryLedger};
pub use models::{
    AccrualStatus, FailureKind, OrderNumber, OrderStatus, Outcome, Points, PollTask,
};
pub use pool::{PollHandle, PoolConfig, WorkerPool};
pub use processor::{AccrualProcessor, Attempt};
pub use rate_gate::RateGate;
