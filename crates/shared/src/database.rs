//! 数据库连接管理模块
//!
//! 提供 PostgreSQL 连接池管理，支持启动期重试与健康检查。

use crate::config::DatabaseConfig;
use crate::error::{LoyaltyError, Result};
use crate::retry::{RetryPolicy, retry_with_policy};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 创建数据库连接池
    ///
    /// 容器编排下数据库可能晚于服务就绪，瞬时连接错误按 `policy` 退避重试。
    #[instrument(skip(config, policy))]
    pub async fn connect(config: &DatabaseConfig, policy: &RetryPolicy) -> Result<Self> {
        info!("Connecting to database...");

        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        let pool = retry_with_policy(
            policy,
            "database_connect",
            LoyaltyError::is_retryable,
            || {
                let options = options.clone();
                async move { options.connect(&config.url).await.map_err(LoyaltyError::from) }
            },
        )
        .await?;

        info!("Database connection pool created");

        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(LoyaltyError::from)
    }

    /// 执行嵌入的迁移脚本
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        migrator.run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

impl std::ops::Deref for Database {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
