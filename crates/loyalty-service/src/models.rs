//! 积分服务数据模型
//!
//! 数据库记录与 HTTP 请求/响应 DTO。金额在库中以百分之一积分的整数存储，
//! 对外统一使用 [`Points`]。

use accrual_worker::{OrderNumber, OrderStatus, Points};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

// ============================================
// 数据库模型
// ============================================

/// 用户记录
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// 订单记录
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub number: OrderNumber,
    pub login: String,
    pub status: OrderStatus,
    pub accrual: Points,
    pub credited: bool,
    pub uploaded_at: DateTime<Utc>,
}

/// 订单表原始行
#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub number: i64,
    pub login: String,
    pub status: String,
    pub accrual: i64,
    pub credited: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            number: row.number,
            login: row.login,
            status: row.status.parse()?,
            accrual: Points::from_hundredths(row.accrual),
            credited: row.credited,
            uploaded_at: row.uploaded_at,
        })
    }
}

/// 上传订单的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderUpload {
    /// 新订单已登记
    Created,
    /// 当前用户此前已上传
    AlreadyUploaded,
    /// 订单属于其他用户
    OwnedByAnother,
}

/// 用户余额
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

/// 提现记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Withdrawal {
    pub order: String,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}

/// 提现结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Completed,
    InsufficientFunds,
}

// ============================================
// 请求/响应 DTO
// ============================================

/// 注册/登录请求
#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 64, message = "登录名长度必须在 1-64 之间"))]
    pub login: String,
    #[validate(length(min = 1, max = 72, message = "密码长度必须在 1-72 之间"))]
    pub password: String,
}

/// 认证成功响应
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
}

/// 订单列表项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        // 只有已计算完成的订单展示积分
        let accrual = (order.status == OrderStatus::Processed).then_some(order.accrual);
        Self {
            number: order.number.to_string(),
            status: order.status,
            accrual,
            uploaded_at: order.uploaded_at,
        }
    }
}

/// 提现请求
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Points,
}
