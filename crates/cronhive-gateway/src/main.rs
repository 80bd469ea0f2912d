use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cronhive_core::config::CronhiveConfig;
use cronhive_scheduler::{ShellExecutor, TaskScheduler};
use tracing::info;

mod app;
mod http;

/// HTTP front end for the cronhive task scheduler.
#[derive(Debug, Parser)]
#[command(name = "cronhive-gateway", version)]
struct Args {
    /// Path to cronhive.toml (falls back to $CRONHIVE_CONFIG, then ~/.cronhive/cronhive.toml).
    #[arg(long)]
    config: Option<String>,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`. 0 picks a free port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cronhive_gateway=info,cronhive_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > CRONHIVE_CONFIG env > ~/.cronhive/cronhive.toml
    let config_path = args.config.or_else(|| std::env::var("CRONHIVE_CONFIG").ok());
    let mut config = CronhiveConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        CronhiveConfig::default()
    });
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runner = Arc::new(ShellExecutor::new(config.executor.clone()));
    let scheduler = TaskScheduler::new(runner, &config.scheduler);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "cronhive gateway listening on http://{}{}",
        listener.local_addr()?,
        config.server.base_path
    );

    let state = Arc::new(app::AppState::new(config, scheduler.clone()));
    let router = app::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop every armed schedule before exiting
    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
