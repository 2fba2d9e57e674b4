//! 仓储 Trait 定义

use accrual_worker::{OrderNumber, Points};
use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Balance, Order, OrderUpload, User, WithdrawOutcome, Withdrawal};

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// 创建用户及其余额记录，登录名已存在时返回 false
    async fn create(&self, login: &str, password_hash: &str) -> Result<bool>;
    async fn find(&self, login: &str) -> Result<Option<User>>;
}

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    async fn upload(&self, login: &str, number: OrderNumber) -> Result<OrderUpload>;
    /// 按上传时间倒序列出用户订单
    async fn list_by_user(&self, login: &str) -> Result<Vec<Order>>;
}

/// 余额仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceRepositoryTrait: Send + Sync {
    async fn balance(&self, login: &str) -> Result<Balance>;
    async fn withdraw(&self, login: &str, order: &str, sum: Points) -> Result<WithdrawOutcome>;
    /// 按处理时间倒序列出提现记录
    async fn list_withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>>;
}
