//! API route definitions.
//!
//! This module organizes all HTTP routes for the Rivalwatch API server.
//! Every error body has the same shape: a machine-readable `error` code and a
//! human-readable `message`.

mod bots;
mod commands;
mod comparison;
mod health;
mod logs;
mod retention;
mod sources;

pub use bots::bots_routes;
pub use commands::commands_routes;
pub use comparison::comparison_routes;
pub use health::health_routes;
pub use logs::logs_routes;
pub use retention::retention_routes;
pub use sources::sources_routes;

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use shared::query::QueryError;
use shared::storage::StateStoreError;

/// Error body returned by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Detailed error message.
    pub message: String,
}

/// Status code plus error body, usable as a handler's error type.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

pub(crate) fn internal(message: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %message, "Request failed");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        message.to_string(),
    )
}

pub(crate) fn invalid_json(rejection: &JsonRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "invalid_json", rejection.body_text())
}

pub(crate) fn validation_failed(message: impl std::fmt::Display) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "validation_failed",
        message.to_string(),
    )
}

impl From<QueryError> for ErrorResponse {
    fn from(e: QueryError) -> Self {
        Self {
            error: query_error_code(&e).to_string(),
            message: e.to_string(),
        }
    }
}

fn query_error_code(e: &QueryError) -> &'static str {
    match e {
        QueryError::UnknownSource(_) => "unknown_source",
        QueryError::NoData(_) => "not_found",
        QueryError::NotReady { .. } => "not_ready",
        QueryError::InvalidTimeRange(_) => "invalid_time_range",
        QueryError::Activity(_) | QueryError::State(_) => "storage_error",
    }
}

pub(crate) fn query_error(e: QueryError) -> ApiError {
    let status = match &e {
        QueryError::UnknownSource(_) | QueryError::NoData(_) | QueryError::NotReady { .. } => {
            StatusCode::NOT_FOUND
        }
        QueryError::InvalidTimeRange(_) => StatusCode::BAD_REQUEST,
        QueryError::Activity(_) | QueryError::State(_) => {
            tracing::error!(error = %e, "Query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(e.into()))
}

pub(crate) fn state_error(e: StateStoreError) -> ApiError {
    match e {
        StateStoreError::UnknownSource(id) => api_error(
            StatusCode::NOT_FOUND,
            "unknown_source",
            format!("Unknown source: '{id}'"),
        ),
        other => internal(other),
    }
}

/// Query parameter for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitParams {
    pub limit: Option<usize>,
}
