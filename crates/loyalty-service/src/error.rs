//! 积分服务 HTTP 层错误类型
//!
//! 所有处理器返回 [`ApiError`]，统一转换为 `{success, code, message, data}` 响应体。

use accrual_worker::{CorrelateError, OrderNumber};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// 积分服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("用户名或密码错误")]
    InvalidCredentials,
    #[error("登录名已被占用: {0}")]
    LoginTaken(String),

    // 请求错误
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("不支持的请求类型，需要 {expected}")]
    UnsupportedContentType { expected: &'static str },

    // 业务错误
    #[error("订单号格式错误: {0}")]
    InvalidOrderNumber(String),
    #[error("提现金额必须大于 0")]
    InvalidAmount,
    #[error("订单 {0} 已由其他用户上传")]
    OrderOwnedByAnother(OrderNumber),
    #[error("余额不足")]
    InsufficientFunds,

    // 系统错误
    #[error("订单积分查询失败: {0}")]
    PollFailed(String),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::LoginTaken(_) | Self::OrderOwnedByAnother(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::UnsupportedContentType { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber(_) | Self::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::PollFailed(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::LoginTaken(_) => "LOGIN_TAKEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedContentType { .. } => "UNSUPPORTED_CONTENT_TYPE",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::OrderOwnedByAnother(_) => "ORDER_OWNED_BY_ANOTHER_USER",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::PollFailed(_) => "ACCRUAL_POLL_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::PollFailed(e) => {
                tracing::error!(error = %e, "订单积分查询失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<CorrelateError> for ApiError {
    fn from(err: CorrelateError) -> Self {
        Self::PollFailed(err.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;
