//! 积分计算系统模拟服务
//!
//! 用于开发环境和测试，模拟第三方积分计算系统的 HTTP 接口：
//!
//! - `POST /api/goods`：登记奖励规则
//! - `POST /api/orders`：登记订单及其商品
//! - `GET /api/orders/{number}`：查询订单计算结果，超出每分钟配额时返回 429
//!
//! 登记后的订单每被查询一次推进一步：REGISTERED → PROCESSING → PROCESSED/INVALID。
//!
//! ```rust,no_run
//! use mock_accrual::service::{AccrualState, accrual_routes};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let state = AccrualState::new(0);
//! let app = accrual_routes().with_state(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod models;
pub mod service;
pub mod store;
