//! # TaskNest API Server
//!
//! REST API for per-user task management.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Bearer-token authentication with a per-user owner guard
//! - Task CRUD with soft delete, restore and hard delete
//! - Filtering, sorting and pagination on task listings
//! - Per-client sliding-window rate limiting
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tasknest-api
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tasknest_api::{
    app::{build_router, AppState},
    config::Config,
    telemetry,
};
use tasknest_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};

/// How often idle rate-limit keys are dropped
const RATE_GATE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init("tasknest_api=debug,tasknest_shared=debug,tower_http=debug");

    tracing::info!(
        "TaskNest API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    let state = AppState::postgres(pool.clone(), config)?;

    let sweeper = state.rate_gate.clone().map(|gate| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_GATE_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let dropped = gate.sweep();
                tracing::debug!(dropped, "Swept idle rate limit keys");
            }
        })
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    close_pool(pool).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
