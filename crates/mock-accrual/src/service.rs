//! 模拟积分计算系统的 REST 接口

use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{RegisterOrderRequest, RegisteredOrder, RewardRule};
use crate::store::MemoryStore;

/// 固定窗口请求配额
#[derive(Debug)]
struct RequestBudget {
    /// 每个窗口允许的请求数，0 表示不限
    limit: u32,
    window: Duration,
    state: Mutex<(Instant, u32)>,
}

impl RequestBudget {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new((Instant::now(), 0)),
        }
    }

    /// 占用一个配额，超出时返回需要等待的时间
    fn try_acquire(&self) -> Result<(), Duration> {
        if self.limit == 0 {
            return Ok(());
        }

        let mut state = self.state.lock();
        let (window_start, used) = &mut *state;
        let elapsed = window_start.elapsed();
        if elapsed >= self.window {
            *window_start = Instant::now();
            *used = 0;
        }

        if *used >= self.limit {
            return Err(self.window.saturating_sub(window_start.elapsed()));
        }
        *used += 1;
        Ok(())
    }
}

/// 服务状态
#[derive(Clone)]
pub struct AccrualState {
    pub rules: MemoryStore<RewardRule>,
    pub orders: MemoryStore<RegisteredOrder>,
    budget: Arc<RequestBudget>,
}

impl AccrualState {
    /// `max_requests_per_minute` 为 0 时不限流
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self::with_budget(max_requests_per_minute, Duration::from_secs(60))
    }

    /// 自定义配额窗口
    pub fn with_budget(limit: u32, window: Duration) -> Self {
        Self {
            rules: MemoryStore::new(),
            orders: MemoryStore::new(),
            budget: Arc::new(RequestBudget::new(limit, window)),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.budget.limit
    }
}

/// 构建路由
pub fn accrual_routes() -> Router<AccrualState> {
    Router::new()
        .route("/api/goods", post(register_goods))
        .route("/api/orders", post(register_order))
        .route("/api/orders/{number}", get(get_order))
}

/// 登记奖励规则
///
/// POST /api/goods
async fn register_goods(
    State(state): State<AccrualState>,
    body: Result<Json<RewardRule>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(rule)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    if rule.match_key.is_empty() || rule.reward < 0.0 {
        return StatusCode::BAD_REQUEST;
    }

    if !state.rules.insert_new(&rule.match_key.clone(), rule) {
        return StatusCode::CONFLICT;
    }

    info!(rules = state.rules.count(), "奖励规则已登记");
    StatusCode::OK
}

/// 登记订单
///
/// POST /api/orders
async fn register_order(
    State(state): State<AccrualState>,
    body: Result<Json<RegisterOrderRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(req)) = body else {
        return StatusCode::BAD_REQUEST;
    };
    if req.order.parse::<u64>().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    let order = req.order.clone();
    if !state
        .orders
        .insert_new(&order, RegisteredOrder::new(req.order, req.goods))
    {
        warn!(order = %order, "订单重复登记");
        return StatusCode::CONFLICT;
    }

    info!(order = %order, "订单已登记");
    StatusCode::ACCEPTED
}

/// 查询订单计算结果
///
/// GET /api/orders/{number}
async fn get_order(State(state): State<AccrualState>, Path(number): Path<String>) -> Response {
    if let Err(wait) = state.budget.try_acquire() {
        let retry_after = (wait.as_millis().div_ceil(1000) as u64).max(1);
        warn!(order = %number, retry_after, "请求超出配额");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            format!(
                "No more than {} requests per minute allowed",
                state.budget.limit
            ),
        )
            .into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    let rules = state.rules.list();
    match state.orders.update(&number, |order| order.advance(&rules)) {
        Some(order) => {
            debug!(order = %number, status = ?order.status, "订单计算进度");
            Json(order.to_response()).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
