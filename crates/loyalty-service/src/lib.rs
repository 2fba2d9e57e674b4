//! 积分服务
//!
//! 用户注册登录、订单上传、余额与提现的 REST API。订单积分由 `accrual-worker`
//! 在查询订单列表时向积分计算系统拉取并入账。

pub mod auth;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod luhn;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use state::AppState;

/// 内嵌的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
