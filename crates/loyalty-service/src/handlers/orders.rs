//! 订单上传与查询
//!
//! 查询订单列表时，为该用户所有未完成的订单触发一次积分查询，等待本次请求提交的
//! 全部结果后再从库中读取最新状态返回。

use accrual_worker::OrderNumber;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, Result};
use crate::luhn;
use crate::middleware::AuthUser;
use crate::models::{OrderResponse, OrderUpload};
use crate::state::AppState;

/// 上传订单号
///
/// POST /api/user/orders（text/plain）
#[instrument(skip_all, fields(login = %user.login))]
pub async fn upload_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let is_text = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain"));
    if !is_text {
        return Err(ApiError::UnsupportedContentType {
            expected: "text/plain",
        });
    }
    if body.trim().is_empty() {
        return Err(ApiError::Validation("订单号不能为空".to_string()));
    }

    let number = luhn::parse_order_number(&body)?;

    match state.orders.upload(&user.login, number).await? {
        OrderUpload::AlreadyUploaded => Ok(StatusCode::OK),
        OrderUpload::OwnedByAnother => Err(ApiError::OrderOwnedByAnother(number)),
        OrderUpload::Created => {
            info!(order = number, "订单已上传");
            // 结果由下一次查询订单列表时读取
            if let Err(e) = state.correlator.submit(&user.login, number).await {
                warn!(order = number, error = %e, "提交积分查询失败");
            }
            Ok(StatusCode::ACCEPTED)
        }
    }
}

/// 查询订单列表
///
/// GET /api/user/orders
#[instrument(skip_all, fields(login = %user.login))]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let mut orders = state.orders.list_by_user(&user.login).await?;

    let pending: Vec<OrderNumber> = orders
        .iter()
        .filter(|order| order.status.is_pending())
        .map(|order| order.number)
        .collect();

    if !pending.is_empty() {
        let outcomes = state.correlator.poll_orders(&user.login, &pending).await?;
        debug!(
            pending = pending.len(),
            succeeded = outcomes.values().filter(|o| o.is_success()).count(),
            "订单积分查询完成"
        );
        orders = state.orders.list_by_user(&user.login).await?;
    }

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
