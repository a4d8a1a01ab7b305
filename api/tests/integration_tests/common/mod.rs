//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup, HTTP request helpers, and a manually driven clock.

use api::{create_router, AppState, Config};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shared::clock::{Clock, ManualClock};
use std::sync::Arc;

/// Router, state, and the clock both are driven by.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    /// Returns a fresh clone of the router for one request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Advances the clock by one second and runs an aggregation tick.
    pub fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
        self.state.context().aggregate(self.clock.now()).unwrap();
    }

    /// Current test time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Advances the clock by `by`.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Buffers `count` messages spread over `users` distinct authors.
    pub async fn send_messages(&self, source: &str, count: usize, users: usize) {
        let batch: Vec<Value> = (0..count)
            .map(|i| json!({ "user_id": format!("user-{}", i % users), "channel_id": "general" }))
            .collect();
        let (status, _) = post_json(
            self.app(),
            &format!("/api/v1/sources/{source}/messages"),
            Value::Array(batch),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

/// The moment every test starts at.
pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Creates a test app with fresh in-memory stores and the default sources:
/// Snoot Palace (150 members) against Snoot Club (5000 members).
pub fn test_app() -> TestApp {
    let clock = Arc::new(ManualClock::new(start()));
    let state = AppState::in_memory(Config::default().monitor, clock.clone()).unwrap();
    let router = create_router(state.clone());
    TestApp {
        router,
        state,
        clock,
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// Helper to make a POST request with JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, with_json("POST", uri, &body)).await
}

/// Helper to make a PUT request with JSON body.
pub async fn put_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, with_json("PUT", uri, &body)).await
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Executes a bot command through the API.
pub async fn execute(app: Router, command: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/api/v1/commands/execute",
        json!({ "command": command, "actor_id": "tester" }),
    )
    .await
}
