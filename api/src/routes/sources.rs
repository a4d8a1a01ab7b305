//! Source registry, message ingestion and activity read endpoints.

use super::{
    api_error, internal, invalid_json, query_error, state_error, validation_failed, ApiError,
    LimitParams,
};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{ActivityMetric, MessageEvent, Source, SourceId};
use shared::pipeline::IngestError;
use shared::query::TimeRange;
use shared::storage::StateStore;
use validator::Validate;

const DEFAULT_ACTIVITY_LIMIT: usize = 100;

/// How far ahead of the server clock a client timestamp may be.
const MAX_CLOCK_SKEW: Duration = Duration::seconds(60);

/// Request body for message ingestion - a single event or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageIngestRequest {
    /// A single message.
    Single(MessageRequest),
    /// A batch of messages.
    Batch(Vec<MessageRequest>),
}

/// A message as received from a monitor.
#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    /// Observation time (optional, defaults to the server's clock).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Author of the message.
    #[validate(length(min = 1, message = "user_id cannot be empty"))]
    pub user_id: String,

    /// Channel the message was posted in.
    #[serde(default)]
    pub channel_id: String,
}

/// Response for accepted messages.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageIngestResponse {
    /// Number of buffered messages.
    pub accepted: usize,
}

/// Request body for a member count update.
#[derive(Debug, Deserialize)]
pub struct MemberCountRequest {
    /// New member count.
    pub member_count: u32,
}

/// List of sources.
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    /// Registered sources.
    pub sources: Vec<Source>,
    /// Number of sources.
    pub total_count: usize,
}

/// Metrics of one source.
#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    /// Source the metrics belong to.
    pub source_id: SourceId,
    /// Metrics in the order described by the endpoint.
    pub metrics: Vec<ActivityMetric>,
    /// Number of returned metrics.
    pub total_count: usize,
}

impl ActivityResponse {
    fn new(source_id: SourceId, metrics: Vec<ActivityMetric>) -> Self {
        Self {
            source_id,
            total_count: metrics.len(),
            metrics,
        }
    }
}

/// Bounds of a range query, as RFC 3339 strings.
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    /// Inclusive start.
    pub start: Option<String>,
    /// Inclusive end.
    pub end: Option<String>,
}

/// Creates the source routes.
///
/// # Routes
///
/// - `GET /api/v1/sources` - All registered sources
/// - `GET /api/v1/sources/{id}` - One source
/// - `PUT /api/v1/sources/{id}/members` - Update the member count
/// - `POST /api/v1/sources/{id}/messages` - Buffer one or many messages
/// - `GET /api/v1/sources/{id}/activity` - Newest metrics first
/// - `GET /api/v1/sources/{id}/activity/latest` - The latest metric
/// - `GET /api/v1/sources/{id}/activity/range` - Metrics between two timestamps
pub fn sources_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sources", get(list_sources))
        .route("/api/v1/sources/{id}", get(get_source))
        .route("/api/v1/sources/{id}/members", put(update_members))
        .route("/api/v1/sources/{id}/messages", post(ingest_messages))
        .route("/api/v1/sources/{id}/activity", get(recent_activity))
        .route("/api/v1/sources/{id}/activity/latest", get(latest_activity))
        .route("/api/v1/sources/{id}/activity/range", get(activity_range))
        .with_state(state)
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state.context().state().sources().map_err(state_error)?;
    Ok(Json(SourcesResponse {
        total_count: sources.len(),
        sources,
    }))
}

async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Source>, ApiError> {
    state
        .context()
        .state()
        .source(&SourceId::new(id.clone()))
        .map_err(state_error)?
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "unknown_source",
                format!("Unknown source: '{id}'"),
            )
        })
}

async fn update_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MemberCountRequest>, JsonRejection>,
) -> Result<Json<Source>, ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;
    let source = state
        .context()
        .state()
        .update_member_count(&SourceId::new(id), request.member_count)
        .map_err(state_error)?;

    tracing::info!(source_id = %source.id, member_count = source.member_count, "Member count updated");
    Ok(Json(source))
}

/// Handler for message ingestion.
///
/// Returns 201 Created once every message is buffered, 400 if any message is
/// invalid or stamped more than [`MAX_CLOCK_SKEW`] in the future (nothing is
/// buffered then) and 404 for an unmonitored source.
async fn ingest_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MessageIngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageIngestResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_json(&rejection))?;

    let messages = match request {
        MessageIngestRequest::Single(message) => vec![message],
        MessageIngestRequest::Batch(messages) => messages,
    };

    if messages.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "empty_batch",
            "At least one message is required",
        ));
    }

    for (index, message) in messages.iter().enumerate() {
        message
            .validate()
            .map_err(|e| validation_failed(format!("message {index}: {e}")))?;
    }

    let ctx = state.context();
    let source_id = SourceId::new(id);
    let now = ctx.now();
    let accepted = messages.len();

    let latest_allowed = now + MAX_CLOCK_SKEW;
    if let Some((index, timestamp)) = messages
        .iter()
        .enumerate()
        .find_map(|(i, m)| m.timestamp.filter(|ts| *ts > latest_allowed).map(|ts| (i, ts)))
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "timestamp_in_future",
            format!("message {index}: timestamp {timestamp} is ahead of the server clock ({now})"),
        ));
    }

    for message in messages {
        let event = MessageEvent::new(
            message.timestamp.unwrap_or(now),
            message.user_id,
            message.channel_id,
        );
        ctx.record_message(&source_id, event).map_err(|e| match e {
            IngestError::UnknownSource(_) => {
                api_error(StatusCode::NOT_FOUND, "unknown_source", e.to_string())
            }
            IngestError::BufferUnavailable(_) => internal(e),
        })?;
    }

    tracing::debug!(source_id = %source_id, accepted, "Buffered messages");
    Ok((StatusCode::CREATED, Json(MessageIngestResponse { accepted })))
}

async fn recent_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let source_id = SourceId::new(id);
    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    let metrics = state
        .context()
        .queries()
        .recent(&source_id, limit)
        .map_err(query_error)?;
    Ok(Json(ActivityResponse::new(source_id, metrics)))
}

async fn latest_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivityMetric>, ApiError> {
    state
        .context()
        .queries()
        .latest(&SourceId::new(id))
        .map(Json)
        .map_err(query_error)
}

/// Handler for range queries.
///
/// Both bounds are required and inclusive; an inverted or unparsable range is
/// rejected with 400.
async fn activity_range(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let range = TimeRange::parse(params.start.as_deref(), params.end.as_deref())
        .map_err(|e| query_error(e.into()))?;
    let source_id = SourceId::new(id);
    let metrics = state
        .context()
        .queries()
        .range(&source_id, range)
        .map_err(query_error)?;
    Ok(Json(ActivityResponse::new(source_id, metrics)))
}
