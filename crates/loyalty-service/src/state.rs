//! 应用状态定义

use std::sync::Arc;

use accrual_worker::RequestCorrelator;

use crate::auth::JwtManager;
use crate::repository::{BalanceRepositoryTrait, OrderRepositoryTrait, UserRepositoryTrait};

/// Axum 应用共享状态
///
/// 仓储以 trait object 注入，测试中替换为 mock
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub orders: Arc<dyn OrderRepositoryTrait>,
    pub balances: Arc<dyn BalanceRepositoryTrait>,
    /// 订单积分轮询入口
    pub correlator: RequestCorrelator,
    pub jwt: JwtManager,
    /// 认证 Cookie 名称
    pub cookie_name: String,
}
