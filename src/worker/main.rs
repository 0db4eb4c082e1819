/**
 * Volunteer Sync Entry Point
 *
 * Runs the sync engine headless: drains whatever the queue holds on
 * startup, then keeps the background sync loop alive until Ctrl-C.
 *
 * Usage: `volunteer-sync [config.toml]`
 */
use std::sync::Arc;
use volunteer_sync::shared::EngineConfig;
use volunteer_sync::worker::push::LogPresenter;
use volunteer_sync::worker::sync::SyncTrigger;
use volunteer_sync::worker::SyncEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    tracing::info!("[Sync] Using database {}", config.database_path.display());

    let engine = SyncEngine::open(config, Arc::new(LogPresenter)).await?;

    match engine.executor().drain(SyncTrigger::Startup).await {
        Ok(report) => tracing::info!(
            "[Sync] Startup drain: {} synced, {} rejected, {} retrying",
            report.synced.len(),
            report.rejected.len(),
            report.retrying.len()
        ),
        Err(e) => tracing::error!("[Sync] Startup drain failed: {}", e),
    }

    let worker = engine.spawn_worker();
    tokio::signal::ctrl_c().await?;

    tracing::info!("[Sync] Shutting down");
    worker.shutdown().await;
    engine.close().await;
    Ok(())
}
