//! 积分轮询错误类型

use thiserror::Error;

use crate::models::{FailureKind, OrderNumber};

/// 积分计算系统调用错误
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("积分计算系统不可达: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("积分计算系统响应无法解析: {0}")]
    UnexpectedResponse(String),

    #[error("无效的积分计算系统地址: {0}")]
    InvalidAddress(String),
}

/// 余额账本错误
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("订单不存在: {0}")]
    OrderNotFound(OrderNumber),

    #[error("订单不属于该用户: order={order_number}, user={user_key}")]
    OwnerMismatch {
        order_number: OrderNumber,
        user_key: String,
    },

    #[error("账本存储错误: {0}")]
    Storage(String),
}

/// Worker 池错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker 池已关闭")]
    Closed,
}

/// 请求级结果汇总错误
#[derive(Debug, Error)]
pub enum CorrelateError {
    #[error("订单 {order_number} 轮询失败 ({kind}): {detail}")]
    Fatal {
        order_number: OrderNumber,
        kind: FailureKind,
        detail: String,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
