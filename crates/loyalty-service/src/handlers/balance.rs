//! 余额与提现

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{instrument, warn};

use crate::error::{ApiError, Result};
use crate::luhn;
use crate::middleware::AuthUser;
use crate::models::{Balance, WithdrawOutcome, WithdrawRequest};
use crate::state::AppState;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Balance>> {
    Ok(Json(state.balances.balance(&user.login).await?))
}

/// 以积分抵扣新订单
///
/// POST /api/user/balance/withdraw
#[instrument(skip_all, fields(login = %user.login))]
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(req) = body?;

    let order = req.order.trim();
    if !luhn::is_valid(order) {
        return Err(ApiError::InvalidOrderNumber(order.to_string()));
    }
    if !req.sum.is_positive() {
        return Err(ApiError::InvalidAmount);
    }

    match state.balances.withdraw(&user.login, order, req.sum).await? {
        WithdrawOutcome::Completed => Ok(StatusCode::OK),
        WithdrawOutcome::InsufficientFunds => {
            warn!(order, sum = %req.sum, "余额不足");
            Err(ApiError::InsufficientFunds)
        }
    }
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let withdrawals = state.balances.list_withdrawals(&user.login).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}
