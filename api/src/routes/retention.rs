//! Retention configuration API routes.
//!
//! Provides endpoints for reading and changing the retention horizons, and
//! for running a sweep on demand.

use super::{internal, invalid_json, ApiError};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use shared::config::{ConfigError, DataType, RetentionConfig};
use shared::pipeline::SweepReport;

/// Request body for updating a single retention policy.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRetentionPolicyRequest {
    /// The data type to update.
    pub data_type: DataType,
    /// New TTL in days.
    pub ttl_days: u32,
}

/// Response body for retention operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct RetentionResponse {
    /// Success indicator.
    pub success: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The current retention configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RetentionConfig>,
}

impl RetentionResponse {
    fn success(config: RetentionConfig) -> Self {
        Self {
            success: true,
            message: None,
            config: Some(config),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            config: None,
        }
    }
}

/// Creates retention configuration routes.
///
/// # Routes
///
/// - `GET /api/v1/config/retention` - Get current retention configuration
/// - `PUT /api/v1/config/retention` - Replace the retention configuration
/// - `PUT /api/v1/config/retention/policy` - Update a single retention policy
/// - `POST /api/v1/config/retention/sweep` - Delete expired rows now
pub fn retention_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/config/retention",
            get(get_retention_config).put(update_retention_config),
        )
        .route(
            "/api/v1/config/retention/policy",
            put(update_retention_policy),
        )
        .route("/api/v1/config/retention/sweep", post(run_sweep))
        .with_state(state)
}

async fn get_retention_config(State(state): State<AppState>) -> Response {
    match state.context().retention_config() {
        Ok(config) => Json(RetentionResponse::success(config)).into_response(),
        Err(e) => internal(e).into_response(),
    }
}

async fn update_retention_config(
    State(state): State<AppState>,
    payload: Result<Json<RetentionConfig>, JsonRejection>,
) -> Response {
    let Json(config) = match payload {
        Ok(config) => config,
        Err(rejection) => return invalid_json(&rejection).into_response(),
    };
    apply(&state, config)
}

async fn update_retention_policy(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRetentionPolicyRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return invalid_json(&rejection).into_response(),
    };

    let mut config = match state.context().retention_config() {
        Ok(config) => config,
        Err(e) => return internal(e).into_response(),
    };
    config.update_policy(req.data_type, req.ttl_days);
    apply(&state, config)
}

fn apply(state: &AppState, config: RetentionConfig) -> Response {
    match state.context().update_retention(config.clone()) {
        Ok(()) => Json(RetentionResponse::success(config)).into_response(),
        Err(ConfigError::Retention(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(RetentionResponse::error(reason)),
        )
            .into_response(),
        Err(e) => internal(e).into_response(),
    }
}

async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, ApiError> {
    let context = state.context().clone();
    let report = tokio::task::spawn_blocking(move || context.sweep(context.now()))
        .await
        .map_err(internal)?
        .map_err(internal)?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::{DateTime, Duration};
    use http_body_util::BodyExt;
    use shared::clock::ManualClock;
    use shared::models::ActivityMetric;
    use shared::storage::ActivityStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        AppState::in_memory(Config::default().monitor, clock).unwrap()
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_get_retention_config() {
        let app = retention_routes(test_state());

        let (status, body) = send(app, "GET", "/api/v1/config/retention", None).await;
        assert_eq!(status, StatusCode::OK);

        let response: RetentionResponse = serde_json::from_value(body).unwrap();
        assert!(response.success);
        assert_eq!(response.config.unwrap(), RetentionConfig::default());
    }

    #[tokio::test]
    async fn test_update_retention_config() {
        let app = retention_routes(test_state());

        let new_config = RetentionConfig::new(7, 14);
        let (status, _) = send(
            app.clone(),
            "PUT",
            "/api/v1/config/retention",
            Some(&serde_json::to_string(&new_config).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(app, "GET", "/api/v1/config/retention", None).await;
        assert_eq!(body["config"]["activity_metrics"]["ttl_days"], 7);
        assert_eq!(body["config"]["system_logs"]["ttl_days"], 14);
    }

    #[tokio::test]
    async fn test_update_single_policy_and_reject_invalid() {
        let app = retention_routes(test_state());

        let (status, body) = send(
            app.clone(),
            "PUT",
            "/api/v1/config/retention/policy",
            Some(r#"{"data_type": "system_logs", "ttl_days": 3}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["system_logs"]["ttl_days"], 3);
        assert_eq!(body["config"]["activity_metrics"]["ttl_days"], 30);

        let (status, body) = send(
            app,
            "PUT",
            "/api/v1/config/retention/policy",
            Some(r#"{"data_type": "activity_metrics", "ttl_days": 0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_metrics() {
        let state = test_state();
        let ctx = state.context();
        let now = ctx.now();
        ctx.activity()
            .append(ActivityMetric::new("snoot_palace", now - Duration::days(31), 60, 3, 2))
            .unwrap();
        ctx.activity()
            .append(ActivityMetric::new("snoot_palace", now - Duration::days(1), 60, 4, 2))
            .unwrap();
        let app = retention_routes(state.clone());

        let (status, body) = send(app, "POST", "/api/v1/config/retention/sweep", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activity_metrics"], 1);
        assert_eq!(state.context().activity().count().unwrap(), 1);
    }
}
