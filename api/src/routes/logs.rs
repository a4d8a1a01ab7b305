//! System log endpoints.

use super::{api_error, internal, invalid_json, validation_failed, ApiError};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{SystemLogEntry, SystemLogKind};

const DEFAULT_LOG_LIMIT: usize = 50;

/// Query parameters for the system log listing.
#[derive(Debug, Default, Deserialize)]
pub struct LogQueryParams {
    /// Maximum number of entries (default 50).
    pub limit: Option<usize>,
    /// Only entries of this kind, e.g. `leader_changed`.
    pub kind: Option<String>,
}

/// Request body for appending a system log entry.
#[derive(Debug, Deserialize)]
pub struct SystemLogRequest {
    /// Entry kind.
    pub kind: SystemLogKind,
    /// Entry text.
    pub message: String,
    /// Structured context, stored as JSON text.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// When the event happened (optional, defaults to now).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// System log listing.
#[derive(Debug, Serialize)]
pub struct SystemLogResponse {
    /// Entries, newest first.
    pub logs: Vec<SystemLogEntry>,
    /// Number of returned entries.
    pub total_count: usize,
}

/// Creates the system log routes.
///
/// # Routes
///
/// - `GET /api/v1/logs` - Recent system log entries, optionally by kind
/// - `POST /api/v1/logs` - Append a system log entry
pub fn logs_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/logs", get(list_logs).post(append_log))
        .with_state(state)
}

async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<SystemLogResponse>, ApiError> {
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<SystemLogKind>)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "invalid_kind", e.to_string()))?;

    let logs = state
        .context()
        .audit()
        .recent_system(params.limit.unwrap_or(DEFAULT_LOG_LIMIT), kind)
        .map_err(internal)?;

    Ok(Json(SystemLogResponse {
        total_count: logs.len(),
        logs,
    }))
}

async fn append_log(
    State(state): State<AppState>,
    payload: Result<Json<SystemLogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SystemLogEntry>), ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;
    let ctx = state.context();

    let mut entry = SystemLogEntry::new(request.kind, request.message)
        .with_timestamp(request.timestamp.unwrap_or_else(|| ctx.now()));
    if let Some(metadata) = request.metadata {
        entry = entry.with_metadata(metadata.to_string());
    }
    entry.validate_entry().map_err(validation_failed)?;

    ctx.audit().log_system(entry.clone()).map_err(internal)?;
    tracing::debug!(kind = %entry.kind, "System log entry appended");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use shared::clock::ManualClock;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_router() -> Router {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        logs_routes(AppState::in_memory(Config::default().monitor, clock).unwrap())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/logs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_filter_by_kind() {
        let app = create_test_router();

        let (status, body) = send(
            app.clone(),
            post(r#"{"kind": "bot_error", "message": "Gateway timeout", "metadata": {"code": 504}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["kind"], "bot_error");

        send(
            app.clone(),
            post(r#"{"kind": "activity_spike", "message": "Spike on snoot_club"}"#),
        )
        .await;

        let (status, body) = send(app.clone(), get("/api/v1/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 2);

        let (_, body) = send(app, get("/api/v1/logs?kind=bot_error&limit=5")).await;
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["logs"][0]["metadata"], r#"{"code":504}"#);
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind_and_empty_message() {
        let app = create_test_router();

        let (status, body) = send(app.clone(), get("/api/v1/logs?kind=party")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_kind");

        let (status, body) = send(app, post(r#"{"kind": "bot_error", "message": ""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
    }
}
