//! callq - Main Entry Point
//! HTTP boundary + summary publisher over a SQLite record store

mod logging;
mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// Import workspace crates
use callq_api_http::{AppState, HttpServer};
use callq_core::application::{
    shutdown_channel, AggregationCache, BroadcastHub, QueueService, SummaryPublisher,
};
use callq_infra_sqlite::{create_pool, run_migrations, SqliteQueueRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Local overrides for development
    dotenv::dotenv().ok();

    // 1. Initialize logging
    let _log_guard = logging::init_logging()?;

    info!("callq v{} starting...", VERSION);

    // 2. Load configuration (fails fast without store url/key)
    let settings = settings::load()?;

    info!(
        store_url = %settings.store.url,
        tracked_queues = settings.summary.tracked_queues.len(),
        "Initializing record store..."
    );

    // 3. Initialize database
    let pool = create_pool(&settings.store.url, Some(settings.store.key.as_str()))
        .await
        .map_err(|e| anyhow::anyhow!("Store pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let repo = Arc::new(SqliteQueueRepository::new(pool.clone()));
    let service = Arc::new(QueueService::new(repo.clone(), repo.clone()));
    let cache = Arc::new(AggregationCache::new(
        repo.clone(),
        settings.summary.tracked_queues.clone(),
    ));
    let hub = BroadcastHub::new(settings.summary.channel_capacity);

    // 5. Start summary publisher
    info!("Starting summary publisher...");
    let publisher = SummaryPublisher::new(
        cache.clone(),
        hub.clone(),
        settings.summary.publisher_config(),
    )
    .start();

    // 6. Start HTTP server
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let server = HttpServer::new(
        settings.server.http_config(),
        AppState::new(service, cache, hub.clone()),
    )
    .start(shutdown_rx)
    .await
    .map_err(|e| anyhow::anyhow!("HTTP server start failed: {}", e))?;

    info!(addr = %server.local_addr(), "System ready");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: stop ticking, end streams, drain requests
    publisher.stop().await;
    shutdown_tx.shutdown();
    hub.close_all();

    match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server.stopped()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server stopped with error"),
        Err(_) => warn!("HTTP server did not drain in time"),
    }

    pool.close().await;
    info!("Shutdown complete.");

    Ok(())
}
