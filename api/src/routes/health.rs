//! Health check endpoint.
//!
//! Reports that the API is reachable, plus the status row this process
//! maintains through its heartbeat.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use shared::models::BotStatusView;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Status rows of the monitored processes, if readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<BotStatusView>>,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check handler.
///
/// Always answers 200 while the server is up; a failing state store only
/// drops the `processes` field.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ctx = state.context();
    let processes = ctx
        .queries()
        .bot_statuses(ctx.now())
        .inspect_err(|e| tracing::warn!(error = %e, "Health check could not read statuses"))
        .ok()
        .map(|statuses| statuses.into_values().collect());

    Json(HealthResponse {
        status: "healthy",
        service: "rivalwatch-api",
        version: env!("CARGO_PKG_VERSION"),
        processes,
    })
}
