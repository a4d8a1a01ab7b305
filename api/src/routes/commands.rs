//! Bot command endpoints: the command log and command execution.

use super::{api_error, internal, invalid_json, validation_failed, ApiError, LimitParams};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::commands::{CommandExecutor, CommandReply};
use shared::models::CommandLogEntry;
use validator::Validate;

const DEFAULT_LOG_LIMIT: usize = 50;
const DEFAULT_ACTOR: &str = "api";

/// Request body for appending a command log entry.
#[derive(Debug, Deserialize)]
pub struct CommandLogRequest {
    /// The invoked command.
    pub command: String,
    /// Who invoked it.
    pub actor_id: String,
    /// Whether it succeeded.
    pub success: bool,
    /// Response or error text.
    #[serde(default)]
    pub response: Option<String>,
}

/// Request body for command execution.
#[derive(Debug, Deserialize, Validate)]
pub struct ExecuteRequest {
    /// Command line, e.g. `/history 6h`.
    #[validate(length(min = 1, message = "Command cannot be empty"))]
    pub command: String,
    /// Who invokes the command (optional, defaults to "api").
    #[serde(default)]
    pub actor_id: Option<String>,
}

/// Command log listing.
#[derive(Debug, Serialize)]
pub struct CommandLogResponse {
    /// Entries, newest first.
    pub commands: Vec<CommandLogEntry>,
    /// Number of returned entries.
    pub total_count: usize,
}

/// Creates the command routes.
///
/// # Routes
///
/// - `GET /api/v1/commands` - Recent command log entries
/// - `POST /api/v1/commands` - Append a command log entry
/// - `POST /api/v1/commands/execute` - Parse, answer and log a bot command
pub fn commands_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/commands", get(list_commands).post(log_command))
        .route("/api/v1/commands/execute", post(execute_command))
        .with_state(state)
}

async fn list_commands(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<CommandLogResponse>, ApiError> {
    let commands = state
        .context()
        .audit()
        .recent_commands(params.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .map_err(internal)?;
    Ok(Json(CommandLogResponse {
        total_count: commands.len(),
        commands,
    }))
}

async fn log_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandLogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommandLogEntry>), ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;
    let ctx = state.context();

    let mut entry = CommandLogEntry::new(request.command, request.actor_id, request.success)
        .with_timestamp(ctx.now());
    entry.response = request.response;
    entry.validate_entry().map_err(validation_failed)?;

    ctx.audit().log_command(entry.clone()).map_err(internal)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Handler for command execution.
///
/// Answers 200 with the rendered reply, or 400 with an unsuccessful reply
/// when the command does not parse or cannot be answered yet.
async fn execute_command(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommandReply>), ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;
    request.validate().map_err(validation_failed)?;

    let actor = request.actor_id.as_deref().unwrap_or(DEFAULT_ACTOR);
    if actor.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_failed",
            "actor_id cannot be blank",
        ));
    }

    let context = state.context().clone();
    let command = request.command;
    let actor = actor.to_string();
    // Answering reads the stores synchronously.
    let reply = tokio::task::spawn_blocking(move || {
        CommandExecutor::new(&context).execute(&command, &actor)
    })
    .await
    .map_err(internal)?;

    let status = if reply.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(reply)))
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

    fn test_state() -> AppState {
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        AppState::in_memory(Config::default().monitor, clock).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_status_command() {
        let app = commands_routes(test_state());

        let (status, body) = send(
            app.clone(),
            post("/api/v1/commands/execute", r#"{"command": "/status", "actor_id": "user-1"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["command"], "status");

        let (_, body) = send(
            app,
            Request::builder()
                .uri("/api/v1/commands")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["commands"][0]["actor_id"], "user-1");
    }

    #[tokio::test]
    async fn test_execute_unknown_command_is_logged_as_failure() {
        let app = commands_routes(test_state());

        let (status, body) =
            send(app.clone(), post("/api/v1/commands/execute", r#"{"command": "/dance"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["text"].as_str().unwrap().contains("Unknown command"));

        let (_, body) = send(
            app,
            Request::builder()
                .uri("/api/v1/commands?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["commands"][0]["success"], false);
        assert_eq!(body["commands"][0]["actor_id"], "api");
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_command() {
        let app = commands_routes(test_state());

        let (status, body) =
            send(app, post("/api/v1/commands/execute", r#"{"command": ""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
    }

    #[tokio::test]
    async fn test_append_command_log() {
        let app = commands_routes(test_state());

        let (status, body) = send(
            app.clone(),
            post(
                "/api/v1/commands",
                r#"{"command": "activity", "actor_id": "user-2", "success": true, "response": "ok"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["response"], "ok");

        let (status, body) = send(
            app,
            post(
                "/api/v1/commands",
                r#"{"command": "", "actor_id": "user-2", "success": true}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
    }
}
