//! 数据访问层
//!
//! 处理器只依赖 [`traits`] 中的接口，PostgreSQL 实现在启动时注入。

mod balance_repo;
mod ledger;
mod order_repo;
mod traits;
mod user_repo;

pub use balance_repo::BalanceRepository;
pub use ledger::PgBalanceLedger;
pub use order_repo::OrderRepository;
pub use traits::{BalanceRepositoryTrait, OrderRepositoryTrait, UserRepositoryTrait};
pub use user_repo::UserRepository;

#[cfg(test)]
pub use traits::{MockBalanceRepositoryTrait, MockOrderRepositoryTrait, MockUserRepositoryTrait};
