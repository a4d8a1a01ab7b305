//! Integration tests for per-capita comparison and streak tracking.

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use super::common::{get, post_json, test_app};

fn timestamp(value: &Value) -> DateTime<Utc> {
    serde_json::from_value(value.clone()).unwrap()
}

#[tokio::test]
async fn test_comparison_not_ready_before_first_tick() {
    let app = test_app();

    let (status, response) = get(app.app(), "/api/v1/comparison").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "not_ready");
}

#[tokio::test]
async fn test_smaller_source_leads_on_equal_messages() {
    let app = test_app();
    app.send_messages("snoot_palace", 10, 5).await;
    app.send_messages("snoot_club", 10, 5).await;
    app.tick();

    let (status, comparison) = get(app.app(), "/api/v1/comparison").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comparison["leader"], "snoot_palace");
    assert_eq!(comparison["source_a_leads"], true);

    let ratio = comparison["ratio"].as_f64().unwrap();
    assert!((ratio - 5000.0 / 150.0).abs() < 0.01);
    assert_eq!(comparison["advantage_percent"], 3233);
}

#[tokio::test]
async fn test_idle_sources_are_tied() {
    let app = test_app();
    app.tick();

    let (status, comparison) = get(app.app(), "/api/v1/comparison").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comparison["ratio"], 1.0);
    assert_eq!(comparison["leader"], Value::Null);
    assert_eq!(comparison["advantage_percent"], 0);

    // A tie never crowns a first leader.
    let (_, streak) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(streak["leadership"], json!({ "state": "no_leader" }));
}

#[tokio::test]
async fn test_first_leader_starts_streak() {
    let app = test_app();
    app.send_messages("snoot_palace", 4, 2).await;
    app.tick();

    let (status, streak) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        streak["leadership"],
        json!({ "state": "leader", "source_id": "snoot_palace" })
    );
    assert_eq!(timestamp(&streak["streak_started_at"]), app.now());
    assert_eq!(streak["needs_notification"], true);
    assert_eq!(streak["duration_seconds"], 0);
}

#[tokio::test]
async fn test_leader_change_resets_streak_and_notification() {
    let app = test_app();
    app.send_messages("snoot_palace", 10, 5).await;
    app.send_messages("snoot_club", 10, 5).await;
    app.tick();
    let first_started = app.now();

    let (status, notified) = post_json(app.app(), "/api/v1/streak/notified", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timestamp(&notified["last_notification_at"]), app.now());

    let (_, streak) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(streak["needs_notification"], false);

    // Same leader on the next tick keeps the streak.
    app.advance(Duration::seconds(60));
    app.send_messages("snoot_palace", 3, 3).await;
    app.tick();
    let (_, streak) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(timestamp(&streak["streak_started_at"]), first_started);
    assert_eq!(streak["duration_seconds"], 61);
    assert!(!streak["last_notification_at"].is_null());

    // Only the larger source talks now.
    app.advance(Duration::seconds(60));
    app.send_messages("snoot_club", 1, 1).await;
    app.tick();

    let (_, streak) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(
        streak["leadership"],
        json!({ "state": "leader", "source_id": "snoot_club" })
    );
    assert_eq!(timestamp(&streak["streak_started_at"]), app.now());
    assert!(streak["last_notification_at"].is_null());
    assert_eq!(streak["needs_notification"], true);

    // First lead plus one takeover.
    let (_, logs) = get(app.app(), "/api/v1/logs?kind=leader_changed").await;
    assert_eq!(logs["total_count"], 2);
    let latest = logs["logs"][0]["message"].as_str().unwrap();
    assert_eq!(latest, "snoot_club took the lead from snoot_palace");
}
