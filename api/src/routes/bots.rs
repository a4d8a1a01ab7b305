//! Process liveness endpoints.

use super::{invalid_json, query_error, validation_failed, ApiError};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{BotStatus, BotStatusView, ProcessStatus};
use std::collections::BTreeMap;
use validator::Validate;

/// Request body for a status upsert.
#[derive(Debug, Deserialize)]
pub struct BotStatusRequest {
    /// Human-readable process name.
    pub name: String,
    /// Reported status.
    pub status: ProcessStatus,
    /// When the status was observed (optional, defaults to now).
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Creates the liveness routes.
///
/// # Routes
///
/// - `GET /api/v1/bots/status` - Every process with its staleness verdict
/// - `PUT /api/v1/bots/status/{id}` - Insert or replace one process status
pub fn bots_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/bots/status", get(list_statuses))
        .route("/api/v1/bots/status/{id}", put(upsert_status))
        .with_state(state)
}

async fn list_statuses(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, BotStatusView>>, ApiError> {
    let ctx = state.context();
    ctx.queries()
        .bot_statuses(ctx.now())
        .map(Json)
        .map_err(query_error)
}

async fn upsert_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BotStatusRequest>, JsonRejection>,
) -> Result<Json<BotStatusView>, ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;
    let ctx = state.context();
    let now = ctx.now();

    let status = BotStatus::new(id, request.name, request.status, request.last_seen.unwrap_or(now));
    status.validate().map_err(validation_failed)?;

    ctx.queries()
        .upsert_bot_status(status.clone())
        .map_err(query_error)?;
    tracing::debug!(id = %status.id, status = %status.status, "Bot status updated");

    Ok(Json(BotStatusView::judge(
        status,
        now,
        ctx.pipeline().heartbeat_chrono(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use shared::clock::ManualClock;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let state = AppState::in_memory(Config::default().monitor, clock.clone()).unwrap();
        (state, clock)
    }

    async fn put_status(app: Router, id: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/v1/bots/status/{id}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    async fn list(app: Router) -> serde_json::Value {
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/bots/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_list() {
        let (state, _) = test_state();
        let app = bots_routes(state);

        let (status, body) = put_status(
            app.clone(),
            "command_bot",
            r#"{"name": "Command Bot", "status": "online"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suspect"], false);

        let statuses = list(app).await;
        assert_eq!(statuses["command_bot"]["status"], "online");
        assert_eq!(statuses["command_bot"]["name"], "Command Bot");
    }

    #[tokio::test]
    async fn test_stale_status_becomes_suspect() {
        let (state, clock) = test_state();
        let app = bots_routes(state);

        put_status(
            app.clone(),
            "command_bot",
            r#"{"name": "Command Bot", "status": "online"}"#,
        )
        .await;
        clock.advance(Duration::minutes(11));

        let statuses = list(app).await;
        assert_eq!(statuses["command_bot"]["suspect"], true);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_input() {
        let (state, _) = test_state();
        let app = bots_routes(state);

        let (status, body) =
            put_status(app.clone(), "command_bot", r#"{"name": "", "status": "online"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");

        let (status, body) =
            put_status(app, "command_bot", r#"{"name": "Bot", "status": "sleeping"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_json");
    }
}
