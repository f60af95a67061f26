use std::sync::Arc;

use anyhow::{Context, Result};
use room_api::{create_app, Config};
use room_orchestrator::RoomManager;
use room_runtime::docker::DockerRuntime;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = room_logging::init_subscriber();

    info!("Starting room-api service...");

    let mut config = Config::from_env();
    config.resolve_nat1to1().await;
    info!(
        bind_addr = %config.bind_addr,
        epr = %config.epr,
        nat1to1 = ?config.nat1to1,
        domain = %config.traefik_domain,
        "Configuration loaded"
    );

    let runtime = DockerRuntime::new();
    runtime
        .check_daemon_running()
        .context("Docker daemon is not reachable")?;

    let manager = RoomManager::new(config.room_config(), Arc::new(runtime));
    let app = create_app(manager);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, stopping room-api gracefully");
        })
        .await
        .context("Server failed")?;

    Ok(())
}
