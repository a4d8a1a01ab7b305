//! Rivalwatch API Server
//!
//! This crate provides the HTTP server for the Rivalwatch activity monitor.
//! It ingests chat messages, drives the aggregation scheduler, and serves
//! comparisons, streaks, process statuses, and bot commands.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - REST API for message ingestion and activity queries
//! - Bot command execution with audit logging
//! - A background scheduler for aggregation, heartbeats and retention sweeps
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod db;
mod routes;
mod state;

pub use config::{Config, StorageBackend};
pub use routes::ErrorResponse;
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use shared::pipeline::{LifecycleEvent, MonitorContext};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Runs the Rivalwatch API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The storage backend cannot be reached
/// - The server fails to bind to the configured address
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Rivalwatch API server with the provided configuration.
///
/// The scheduler starts with the server. On shutdown the server stops
/// accepting requests, the scheduler drains in-flight ticks, and the process
/// status is set to offline.
///
/// # Errors
///
/// Returns an error if:
/// - The storage backend cannot be reached
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        source_a = %config.monitor.sources.0.id,
        source_b = %config.monitor.sources.1.id,
        "Rivalwatch API server starting"
    );

    let state = AppState::from_config(&config).await?;
    let context = Arc::clone(state.context());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = context.scheduler();
    tracing::info!(tasks = ?scheduler.task_names(), "Scheduler starting");
    let scheduler = tokio::spawn(scheduler.run(shutdown_rx));
    record_lifecycle(&context, LifecycleEvent::Started).await;

    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop dispatching and wait for running ticks before going offline.
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Scheduler already stopped");
    }
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }
    record_lifecycle(&context, LifecycleEvent::Stopped).await;

    served?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::sources_routes(state.clone()))
        .merge(routes::comparison_routes(state.clone()))
        .merge(routes::bots_routes(state.clone()))
        .merge(routes::commands_routes(state.clone()))
        .merge(routes::logs_routes(state.clone()))
        .merge(routes::retention_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

async fn record_lifecycle(context: &Arc<MonitorContext>, event: LifecycleEvent) {
    let context = Arc::clone(context);
    match tokio::task::spawn_blocking(move || context.lifecycle(event)).await {
        Ok(Ok(())) => tracing::info!(?event, "Lifecycle event recorded"),
        Ok(Err(e)) => tracing::warn!(?event, error = %e, "Failed to record lifecycle event"),
        Err(e) => tracing::error!(?event, error = %e, "Lifecycle task failed"),
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
