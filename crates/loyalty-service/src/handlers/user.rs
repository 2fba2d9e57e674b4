//! 用户注册与登录
//!
//! 认证成功后在 Cookie 中写入 JWT，同时在响应体中返回 Token 供 Bearer 方式使用。

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, Result};
use crate::models::{Credentials, TokenResponse};
use crate::state::AppState;

/// 用户注册
///
/// POST /api/user/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    body: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let Json(req) = body?;
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    if !state.users.create(&req.login, &password_hash).await? {
        warn!(login = %req.login, "登录名已被占用");
        return Err(ApiError::LoginTaken(req.login));
    }

    info!(login = %req.login, "用户注册成功");
    authenticate(&state, jar, &req.login)
}

/// 用户登录
///
/// POST /api/user/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let Json(req) = body?;
    req.validate()?;

    let user = state
        .users
        .find(&req.login)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(login = %req.login, "密码错误");
        return Err(ApiError::InvalidCredentials);
    }

    info!(login = %user.login, "用户登录成功");
    authenticate(&state, jar, &user.login)
}

fn authenticate(
    state: &AppState,
    jar: CookieJar,
    login: &str,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let (token, expires_at) = state.jwt.generate_token(login)?;

    let cookie = Cookie::build((state.cookie_name.clone(), token.clone()))
        .path("/")
        .http_only(true)
        .build();

    Ok((jar.add(cookie), Json(TokenResponse { token, expires_at })))
}
