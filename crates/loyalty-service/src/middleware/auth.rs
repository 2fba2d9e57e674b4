//! JWT 认证中间件
//!
//! Token 取自认证 Cookie，其次是 `Authorization: Bearer` 头；
//! 验证通过后将 [`AuthUser`] 注入请求扩展。

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::state::AppState;

/// 无需认证的路由
pub const PUBLIC_PATHS: [&str; 4] = [
    "/api/user/register",
    "/api/user/login",
    "/health",
    "/ready",
];

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub login: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if PUBLIC_PATHS.contains(&path) {
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = match jar
        .get(&state.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .or(bearer)
    {
        Some(token) => token,
        None => return unauthorized_response("缺少认证 Token"),
    };

    match state.jwt.verify_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser { login: claims.sub });
            next.run(request).await
        }
        Err(e) => unauthorized_response(&e.to_string()),
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "UNAUTHORIZED",
        "message": message,
        "data": null
    });

    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}
