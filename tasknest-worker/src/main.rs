//! # TaskNest Worker
//!
//! Background maintenance for TaskNest: permanently purges tasks that have
//! been soft-deleted for longer than the retention window.
//!
//! ## Usage
//!
//! ```bash
//! RETENTION_DAYS=30 PURGE_INTERVAL_SECONDS=3600 cargo run -p tasknest-worker
//! ```

use std::sync::Arc;

use tasknest_shared::{
    clock::system_clock,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool},
    },
    service::TaskService,
    store::PgTaskStore,
};
use tasknest_worker::{config::WorkerConfig, retention::RetentionSweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "TaskNest Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    let tasks = TaskService::new(Arc::new(PgTaskStore::new(pool.clone())), system_clock())
        .with_timeout(config.storage_timeout);
    let sweeper = RetentionSweeper::new(tasks, config.retention);

    let shutdown = sweeper.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    sweeper.run().await;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tasknest_worker=debug,tasknest_shared=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.trim().eq_ignore_ascii_case("json"));
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
