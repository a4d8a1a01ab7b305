//! Comparison and streak endpoints.

use super::{internal, query_error, ApiError};
use crate::state::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared::models::StreakState;
use shared::query::Comparison;

/// Current streak with derived fields.
#[derive(Debug, Serialize)]
pub struct StreakResponse {
    /// Stored streak state.
    #[serde(flatten)]
    pub streak: StreakState,
    /// Seconds since the current streak began.
    pub duration_seconds: i64,
    /// True if a leader exists and the streak has not been announced yet.
    pub needs_notification: bool,
}

/// Creates comparison and streak routes.
///
/// # Routes
///
/// - `GET /api/v1/comparison` - Per-capita comparison of the latest metrics
/// - `GET /api/v1/streak` - Current streak
/// - `POST /api/v1/streak/notified` - Mark the current streak as announced
pub fn comparison_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/comparison", get(get_comparison))
        .route("/api/v1/streak", get(get_streak))
        .route("/api/v1/streak/notified", post(mark_notified))
        .with_state(state)
}

/// Handler for GET /api/v1/comparison.
///
/// Returns 404 with `not_ready` until both sources have a metric.
async fn get_comparison(State(state): State<AppState>) -> Result<Json<Comparison>, ApiError> {
    state
        .context()
        .queries()
        .comparison()
        .map(Json)
        .map_err(query_error)
}

async fn get_streak(State(state): State<AppState>) -> Result<Json<StreakResponse>, ApiError> {
    let ctx = state.context();
    let tracker = ctx.streak();
    let streak = tracker.current().map_err(internal)?;
    let needs_notification = tracker.needs_notification().map_err(internal)?;

    Ok(Json(StreakResponse {
        duration_seconds: streak.duration_at(ctx.now()).num_seconds(),
        needs_notification,
        streak,
    }))
}

async fn mark_notified(State(state): State<AppState>) -> Result<Json<StreakState>, ApiError> {
    let streak = state.context().mark_notified().map_err(internal)?;
    tracing::info!(leader = ?streak.current_leader(), "Streak marked as notified");
    Ok(Json(streak))
}
