//! 积分计算系统模拟服务入口

use anyhow::Context;
use axum::middleware;
use clap::Parser;
use loyalty_shared::config::ObservabilityConfig;
use loyalty_shared::observability::{self, middleware::http_tracing};
use mock_accrual::cli::Cli;
use mock_accrual::service::{AccrualState, accrual_routes};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    observability::tracing::init(&ObservabilityConfig {
        log_level: cli.log_level.clone(),
        log_format: cli.log_format.clone(),
        metrics_enabled: false,
        ..Default::default()
    })?;

    let state = AccrualState::new(cli.max_requests_per_minute);
    let app = accrual_routes()
        .with_state(state)
        .layer(middleware::from_fn(http_tracing));

    let address = if cli.address.starts_with(':') {
        format!("0.0.0.0{}", cli.address)
    } else {
        cli.address.clone()
    };
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("无法监听 {address}"))?;

    info!(
        address = %address,
        max_requests_per_minute = cli.max_requests_per_minute,
        "积分计算系统模拟服务已启动"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
