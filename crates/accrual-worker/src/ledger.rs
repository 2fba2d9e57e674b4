//! 余额账本接口
//!
//! `credit_once` 必须保证同一订单至多入账一次，即使多个 Worker 并发处理同一订单。
//! PostgreSQL 实现位于服务 crate，此处提供内存实现用于测试和本地联调。

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LedgerError;
use crate::models::{OrderNumber, OrderStatus, Points};

/// 入账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditResult {
    /// 本次调用完成入账
    Credited,
    /// 订单此前已入账，余额未变
    AlreadyCredited,
}

/// 余额账本
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// 将订单积分计入用户余额，同一订单至多生效一次
    async fn credit_once(
        &self,
        user_key: &str,
        order_number: OrderNumber,
        accrual: Points,
    ) -> Result<CreditResult, LedgerError>;

    /// 记录订单状态，终态订单保持不变
    async fn update_order(
        &self,
        order_number: OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), LedgerError>;
}

/// 内存中的订单记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOrder {
    pub user_key: String,
    pub status: OrderStatus,
    pub accrual: Points,
    pub credited: bool,
}

#[derive(Default)]
struct LedgerState {
    orders: HashMap<OrderNumber, LedgerOrder>,
    balances: HashMap<String, Points>,
    unavailable: bool,
}

/// 内存账本
///
/// 单把互斥锁覆盖订单与余额，`credit_once` 的检查与修改在同一临界区内完成。
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个 NEW 状态的订单
    pub fn insert_order(&self, user_key: &str, order_number: OrderNumber) {
        let mut state = self.state.lock();
        state.orders.entry(order_number).or_insert_with(|| LedgerOrder {
            user_key: user_key.to_string(),
            status: OrderStatus::New,
            accrual: Points::ZERO,
            credited: false,
        });
        state.balances.entry(user_key.to_string()).or_default();
    }

    pub fn order(&self, order_number: OrderNumber) -> Option<LedgerOrder> {
        self.state.lock().orders.get(&order_number).cloned()
    }

    pub fn balance(&self, user_key: &str) -> Points {
        self.state
            .lock()
            .balances
            .get(user_key)
            .copied()
            .unwrap_or_default()
    }

    /// 模拟存储故障，之后的所有写入都返回错误
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }
}

#[async_trait]
impl BalanceLedger for MemoryLedger {
    async fn credit_once(
        &self,
        user_key: &str,
        order_number: OrderNumber,
        accrual: Points,
    ) -> Result<CreditResult, LedgerError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.unavailable {
            return Err(LedgerError::Storage("内存账本不可用".to_string()));
        }

        let order = state
            .orders
            .get_mut(&order_number)
            .ok_or(LedgerError::OrderNotFound(order_number))?;
        if order.user_key != user_key {
            return Err(LedgerError::OwnerMismatch {
                order_number,
                user_key: user_key.to_string(),
            });
        }
        if order.credited {
            return Ok(CreditResult::AlreadyCredited);
        }

        order.credited = true;
        order.accrual = accrual;
        *state.balances.entry(user_key.to_string()).or_default() += accrual;

        Ok(CreditResult::Credited)
    }

    async fn update_order(
        &self,
        order_number: OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(LedgerError::Storage("内存账本不可用".to_string()));
        }

        let order = state
            .orders
            .get_mut(&order_number)
            .ok_or(LedgerError::OrderNotFound(order_number))?;
        if order.status.is_terminal() {
            return Ok(());
        }

        order.status = status;
        if !accrual.is_zero() {
            order.accrual = accrual;
        }
        Ok(())
    }
}
