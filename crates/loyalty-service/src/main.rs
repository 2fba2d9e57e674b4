//! 积分服务入口

use std::sync::Arc;
use std::time::Duration;

use accrual_worker::{HttpAccrualGateway, PoolConfig, RequestCorrelator, WorkerPool};
use anyhow::Context;
use axum::{middleware, routing::get};
use clap::Parser;
use loyalty_service::{
    auth::JwtManager,
    cli::Cli,
    handlers::health::readiness_check,
    repository::{BalanceRepository, OrderRepository, PgBalanceLedger, UserRepository},
    routes,
    state::AppState,
};
use loyalty_shared::{
    config::AppConfig,
    database::Database,
    observability::{self, middleware as obs_middleware},
    retry::RetryPolicy,
};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, decompression::RequestDecompressionLayer,
    timeout::TimeoutLayer,
};
use tracing::{info, warn};

const SERVICE_NAME: &str = "loyalty-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;
    cli.apply(&mut config).context("命令行参数无效")?;

    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database, &RetryPolicy::default()).await?;
    db.run_migrations(&loyalty_service::MIGRATOR).await?;

    if config.is_production() && config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
        warn!("Using default JWT secret - set LOYALTY_AUTH__JWT_SECRET for production");
    }

    // 积分轮询：HTTP 客户端 → Worker 池 → PostgreSQL 账本
    let gateway = HttpAccrualGateway::new(
        &config.accrual.address,
        Duration::from_secs(config.accrual.http_timeout_seconds),
    )?;
    let ledger = PgBalanceLedger::new(db.pool().clone());
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::from(&config.accrual),
        Arc::new(gateway),
        Arc::new(ledger),
    ));

    let state = AppState {
        users: Arc::new(UserRepository::new(db.pool().clone())),
        orders: Arc::new(OrderRepository::new(db.pool().clone())),
        balances: Arc::new(BalanceRepository::new(db.pool().clone())),
        correlator: RequestCorrelator::from_config(pool.clone(), &config.accrual),
        jwt: JwtManager::new(&config.auth),
        cookie_name: config.auth.cookie_name.clone(),
    };

    let app = routes::app(state)
        .route(
            "/ready",
            get({
                let db = db.clone();
                move || readiness_check(db.clone())
            }),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_seconds,
        )))
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id));

    let listener = TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("无法监听 {}", config.server_addr()))?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 处理器已全部退出，关闭队列并等待 Worker 结束
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown().await,
        Err(_) => warn!("Worker pool still referenced, skipping graceful drain"),
    }
    db.close().await;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
