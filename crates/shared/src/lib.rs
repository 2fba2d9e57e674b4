//! 共享库
//!
//! 包含积分服务与积分轮询 Worker 共用的配置、错误处理、数据库连接、重试策略与可观测性基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod retry;
