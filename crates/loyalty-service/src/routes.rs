//! 路由配置模块

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    handlers,
    middleware::{auth_middleware, catch_panic_layer},
    state::AppState,
};

/// 用户相关路由，挂载在 `/api/user` 下
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::user::register))
        .route("/login", post(handlers::user::login))
        .route(
            "/orders",
            post(handlers::orders::upload_order).get(handlers::orders::list_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route("/withdrawals", get(handlers::balance::list_withdrawals))
}

/// 业务路由、认证与 panic 恢复中间件
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/user", user_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(catch_panic_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtManager, hash_password};
    use crate::models::{Balance, Order, OrderUpload, User, WithdrawOutcome, Withdrawal};
    use crate::repository::{
        MockBalanceRepositoryTrait, MockOrderRepositoryTrait, MockUserRepositoryTrait,
    };
    use accrual_worker::{
        AccrualGateway, AccrualReply, GatewayError, MemoryLedger, OrderNumber, OrderStatus,
        Points, PoolConfig, RequestCorrelator, WorkerPool,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use loyalty_shared::config::AuthConfig;
    use loyalty_shared::retry::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    /// 对所有订单返回同一应答的积分计算系统
    struct StaticGateway(AccrualReply);

    #[async_trait]
    impl AccrualGateway for StaticGateway {
        async fn fetch(&self, _order_number: OrderNumber) -> Result<AccrualReply, GatewayError> {
            Ok(self.0.clone())
        }
    }

    struct TestApp {
        router: Router,
        jwt: JwtManager,
    }

    impl TestApp {
        fn token(&self, login: &str) -> String {
            self.jwt.generate_token(login).unwrap().0
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    struct Mocks {
        users: MockUserRepositoryTrait,
        orders: MockOrderRepositoryTrait,
        balances: MockBalanceRepositoryTrait,
        reply: AccrualReply,
        ledger: Arc<MemoryLedger>,
        max_attempts: u32,
    }

    impl Default for Mocks {
        fn default() -> Self {
            Self {
                users: MockUserRepositoryTrait::new(),
                orders: MockOrderRepositoryTrait::new(),
                balances: MockBalanceRepositoryTrait::new(),
                reply: AccrualReply::Unknown,
                ledger: Arc::new(MemoryLedger::new()),
                max_attempts: 1,
            }
        }
    }

    fn create_test_app(mocks: Mocks) -> TestApp {
        let config = PoolConfig {
            workers: 1,
            max_requests_per_minute: 60_000,
            queue_capacity: 16,
            max_attempts: mocks.max_attempts,
            pending_backoff: RetryPolicy::with_initial_delay(Duration::from_millis(1)),
        };
        let pool = WorkerPool::new(config, Arc::new(StaticGateway(mocks.reply)), mocks.ledger);
        let auth = AuthConfig::default();
        let jwt = JwtManager::new(&auth);

        let state = AppState {
            users: Arc::new(mocks.users),
            orders: Arc::new(mocks.orders),
            balances: Arc::new(mocks.balances),
            correlator: RequestCorrelator::new(Arc::new(pool), Duration::from_secs(5)),
            jwt: jwt.clone(),
            cookie_name: auth.cookie_name,
        };

        TestApp {
            router: app(state),
            jwt,
        }
    }

    fn json_request(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn text_request(uri: &str, body: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn order(number: OrderNumber, status: OrderStatus, accrual: i64) -> Order {
        Order {
            number,
            login: "alice".to_string(),
            status,
            accrual: Points::from_hundredths(accrual),
            credited: accrual > 0,
            uploaded_at: Utc::now(),
        }
    }

    // ==================== 认证 ====================

    #[tokio::test]
    async fn test_register_sets_auth_cookie() {
        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_create()
            .times(1)
            .returning(|login, hash| {
                assert_eq!(login, "alice");
                assert!(hash.starts_with("$2"));
                Ok(true)
            });
        let app = create_test_app(mocks);

        let response = app
            .send(json_request(
                "/api/user/register",
                r#"{"login": "alice", "password": "s3cret"}"#,
                None,
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("AuthToken="));

        let token = body_json(response).await["token"].as_str().unwrap().to_string();
        assert_eq!(app.jwt.verify_token(&token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_register_taken_login_conflicts() {
        let mut mocks = Mocks::default();
        mocks.users.expect_create().returning(|_, _| Ok(false));
        let app = create_test_app(mocks);

        let response = app
            .send(json_request(
                "/api/user/register",
                r#"{"login": "alice", "password": "s3cret"}"#,
                None,
            ))
            .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "LOGIN_TAKEN");
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_body() {
        let app = create_test_app(Mocks::default());

        for body in [r#"{"login": "alice"}"#, r#"{"login": "", "password": "x"}"#, "not json"] {
            let response = app.send(json_request("/api/user/register", body, None)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_unauthorized() {
        let hash = hash_password("right-password").unwrap();
        let mut mocks = Mocks::default();
        mocks.users.expect_find().returning(move |login| {
            Ok(Some(User {
                login: login.to_string(),
                password_hash: hash.clone(),
                created_at: Utc::now(),
            }))
        });
        let app = create_test_app(mocks);

        let response = app
            .send(json_request(
                "/api/user/login",
                r#"{"login": "alice", "password": "wrong-password"}"#,
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .send(json_request(
                "/api/user/login",
                r#"{"login": "alice", "password": "right-password"}"#,
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = create_test_app(Mocks::default());

        let response = app
            .send(
                Request::builder()
                    .uri("/api/user/balance")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.send(get_request("/api/user/balance", "forged")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cookie_token_is_accepted() {
        let mut mocks = Mocks::default();
        mocks.balances.expect_balance().returning(|_| {
            Ok(Balance {
                current: Points::from_hundredths(50050),
                withdrawn: Points::from_hundredths(4200),
            })
        });
        let app = create_test_app(mocks);

        let response = app
            .send(
                Request::builder()
                    .uri("/api/user/balance")
                    .header(header::COOKIE, format!("AuthToken={}", app.token("alice")))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["current"], 500.5);
        assert_eq!(body["withdrawn"], 42.0);
    }

    // ==================== 订单 ====================

    #[tokio::test]
    async fn test_upload_order_statuses() {
        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_upload()
            .returning(|_, number| match number {
                79927398713 => Ok(OrderUpload::Created),
                12345678903 => Ok(OrderUpload::AlreadyUploaded),
                _ => Ok(OrderUpload::OwnedByAnother),
            });
        mocks.ledger.insert_order("alice", 79927398713);
        let app = create_test_app(mocks);
        let token = app.token("alice");

        let cases = [
            ("79927398713", StatusCode::ACCEPTED),
            ("12345678903\n", StatusCode::OK),
            ("2377225624", StatusCode::CONFLICT),
            ("79927398710", StatusCode::UNPROCESSABLE_ENTITY),
            ("", StatusCode::BAD_REQUEST),
        ];
        for (body, expected) in cases {
            let response = app
                .send(text_request("/api/user/orders", body, &token))
                .await;
            assert_eq!(response.status(), expected, "body: {body:?}");
        }
    }

    #[tokio::test]
    async fn test_upload_order_requires_text_plain() {
        let app = create_test_app(Mocks::default());
        let token = app.token("alice");

        let response = app
            .send(json_request("/api/user/orders", "79927398713", Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "UNSUPPORTED_CONTENT_TYPE");
    }

    #[tokio::test]
    async fn test_list_orders_polls_pending_and_returns_fresh_status() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.insert_order("alice", 79927398713);

        let mut mocks = Mocks {
            reply: AccrualReply::Credited {
                status: OrderStatus::Processed,
                accrual: Points::from_hundredths(50000),
            },
            ledger: ledger.clone(),
            ..Default::default()
        };
        let mut calls = 0;
        mocks
            .orders
            .expect_list_by_user()
            .times(2)
            .returning(move |_| {
                calls += 1;
                Ok(if calls == 1 {
                    vec![
                        order(79927398713, OrderStatus::New, 0),
                        order(2377225624, OrderStatus::Invalid, 0),
                    ]
                } else {
                    vec![
                        order(79927398713, OrderStatus::Processed, 50000),
                        order(2377225624, OrderStatus::Invalid, 0),
                    ]
                })
            });
        let app = create_test_app(mocks);

        let response = app
            .send(get_request("/api/user/orders", &app.token("alice")))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["number"], "79927398713");
        assert_eq!(body[0]["status"], "PROCESSED");
        assert_eq!(body[0]["accrual"], 500.0);
        assert_eq!(body[1]["status"], "INVALID");
        assert!(body[1].get("accrual").is_none());

        assert_eq!(ledger.balance("alice"), Points::from_hundredths(50000));
    }

    #[tokio::test]
    async fn test_list_orders_fatal_poll_failure_is_internal_error() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.insert_order("alice", 79927398713);

        let mut mocks = Mocks {
            reply: AccrualReply::Unavailable { status: 500 },
            ledger: ledger.clone(),
            ..Default::default()
        };
        mocks
            .orders
            .expect_list_by_user()
            .times(1)
            .returning(|_| Ok(vec![order(79927398713, OrderStatus::New, 0)]));
        let app = create_test_app(mocks);

        let response = app
            .send(get_request("/api/user/orders", &app.token("alice")))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ledger.order(79927398713).unwrap().status, OrderStatus::New);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_orders_returns_persisted_rows_while_rate_limited() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.insert_order("alice", 79927398713);

        let mut mocks = Mocks {
            reply: AccrualReply::RateLimited {
                retry_after: Duration::from_secs(60),
            },
            ledger: ledger.clone(),
            max_attempts: 3,
            ..Default::default()
        };
        mocks
            .orders
            .expect_list_by_user()
            .times(2)
            .returning(|_| Ok(vec![order(79927398713, OrderStatus::New, 0)]));
        let app = create_test_app(mocks);

        let start = tokio::time::Instant::now();
        let response = app
            .send(get_request("/api/user/orders", &app.token("alice")))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(start.elapsed() < Duration::from_secs(15));
        let body = body_json(response).await;
        assert_eq!(body[0]["number"], "79927398713");
        assert_eq!(body[0]["status"], "NEW");
        assert_eq!(ledger.balance("alice"), Points::ZERO);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_list_by_user()
            .returning(|_| panic!("连接池状态异常"));
        let app = create_test_app(mocks);

        let response = app
            .send(get_request("/api/user/orders", &app.token("alice")))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_list_orders_without_orders_is_no_content() {
        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_list_by_user()
            .times(1)
            .returning(|_| Ok(vec![]));
        let app = create_test_app(mocks);

        let response = app
            .send(get_request("/api/user/orders", &app.token("alice")))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    // ==================== 余额与提现 ====================

    #[tokio::test]
    async fn test_withdraw_statuses() {
        let mut mocks = Mocks::default();
        mocks
            .balances
            .expect_withdraw()
            .returning(|_, order, sum| {
                assert_eq!(order, "2377225624");
                Ok(if sum <= Points::from_hundredths(75100) {
                    WithdrawOutcome::Completed
                } else {
                    WithdrawOutcome::InsufficientFunds
                })
            });
        let app = create_test_app(mocks);
        let token = app.token("alice");

        let cases = [
            (r#"{"order": "2377225624", "sum": 751}"#, StatusCode::OK),
            (r#"{"order": "2377225624", "sum": 751.01}"#, StatusCode::PAYMENT_REQUIRED),
            (r#"{"order": "2377225625", "sum": 10}"#, StatusCode::UNPROCESSABLE_ENTITY),
            (r#"{"order": "2377225624", "sum": 0}"#, StatusCode::UNPROCESSABLE_ENTITY),
            (r#"{"order": "2377225624"}"#, StatusCode::BAD_REQUEST),
        ];
        for (body, expected) in cases {
            let response = app
                .send(json_request("/api/user/balance/withdraw", body, Some(&token)))
                .await;
            assert_eq!(response.status(), expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_list_withdrawals() {
        let mut mocks = Mocks::default();
        mocks
            .balances
            .expect_list_withdrawals()
            .returning(|login| {
                Ok(if login == "alice" {
                    vec![Withdrawal {
                        order: "2377225624".to_string(),
                        sum: Points::from_hundredths(50000),
                        processed_at: Utc::now(),
                    }]
                } else {
                    vec![]
                })
            });
        let app = create_test_app(mocks);

        let response = app
            .send(get_request("/api/user/withdrawals", &app.token("alice")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["order"], "2377225624");
        assert_eq!(body[0]["sum"], 500.0);

        let response = app
            .send(get_request("/api/user/withdrawals", &app.token("bob")))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_test_app(Mocks::default());
        let response = app
            .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
