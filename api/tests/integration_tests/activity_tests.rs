//! Integration tests for message ingestion and activity queries.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use super::common::{get, post_json, put_json, start, test_app};

#[tokio::test]
async fn test_idle_tick_persists_zero_metric() {
    let app = test_app();
    app.tick();

    for source in ["snoot_palace", "snoot_club"] {
        let (status, metric) =
            get(app.app(), &format!("/api/v1/sources/{source}/activity/latest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(metric["raw_message_count"], 0);
        assert_eq!(metric["active_user_count"], 0);
        assert_eq!(metric["rate"], 0.0);
        assert_eq!(metric["interval_seconds"], 60);
    }
}

#[tokio::test]
async fn test_tick_counts_messages_and_distinct_users() {
    let app = test_app();
    app.send_messages("snoot_palace", 12, 4).await;
    app.tick();

    let (status, metric) = get(app.app(), "/api/v1/sources/snoot_palace/activity/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metric["raw_message_count"], 12);
    assert_eq!(metric["active_user_count"], 4);
    assert_eq!(metric["rate"], 12.0);
}

#[tokio::test]
async fn test_messages_outside_window_are_not_counted() {
    let app = test_app();
    app.send_messages("snoot_palace", 5, 5).await;

    // Move past the one minute window before the next tick.
    app.advance(Duration::seconds(90));
    app.tick();

    let (_, metric) = get(app.app(), "/api/v1/sources/snoot_palace/activity/latest").await;
    assert_eq!(metric["raw_message_count"], 0);
}

#[tokio::test]
async fn test_single_message_with_explicit_timestamp() {
    let app = test_app();
    let timestamp = start() - Duration::seconds(10);

    let (status, response) = post_json(
        app.app(),
        "/api/v1/sources/snoot_club/messages",
        json!({ "timestamp": timestamp, "user_id": "alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["accepted"], 1);

    app.tick();
    let (_, metric) = get(app.app(), "/api/v1/sources/snoot_club/activity/latest").await;
    assert_eq!(metric["raw_message_count"], 1);
}

#[tokio::test]
async fn test_ingest_rejects_unknown_source_and_bad_payloads() {
    let app = test_app();

    let (status, response) = post_json(
        app.app(),
        "/api/v1/sources/nowhere/messages",
        json!({ "user_id": "alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "unknown_source");

    let (status, response) =
        post_json(app.app(), "/api/v1/sources/snoot_club/messages", json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "empty_batch");

    let (status, response) = post_json(
        app.app(),
        "/api/v1/sources/snoot_club/messages",
        json!({ "user_id": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_failed");
}

#[tokio::test]
async fn test_recent_activity_is_newest_first() {
    let app = test_app();
    app.send_messages("snoot_palace", 3, 1).await;
    app.tick();
    app.advance(Duration::seconds(60));
    app.send_messages("snoot_palace", 7, 2).await;
    app.tick();

    let (status, response) =
        get(app.app(), "/api/v1/sources/snoot_palace/activity?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 2);
    assert_eq!(response["metrics"][0]["raw_message_count"], 7);
    assert_eq!(response["metrics"][1]["raw_message_count"], 3);

    let (_, response) = get(app.app(), "/api/v1/sources/snoot_palace/activity?limit=1").await;
    assert_eq!(response["total_count"], 1);
}

#[tokio::test]
async fn test_range_query_is_repeatable() {
    let app = test_app();
    for _ in 0..3 {
        app.send_messages("snoot_club", 2, 2).await;
        app.tick();
        app.advance(Duration::seconds(59));
    }

    let begin = urlencoding::encode(&start().to_rfc3339()).into_owned();
    let end = urlencoding::encode(&app.now().to_rfc3339()).into_owned();
    let uri = format!("/api/v1/sources/snoot_club/activity/range?start={begin}&end={end}");

    let (status, first) = get(app.app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["total_count"], 3);

    let (_, second) = get(app.app(), &uri).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_range_query_rejects_inverted_bounds() {
    let app = test_app();
    let begin = urlencoding::encode("2024-01-02T00:00:00Z").into_owned();
    let end = urlencoding::encode("2024-01-01T00:00:00Z").into_owned();

    let (status, response) = get(
        app.app(),
        &format!("/api/v1/sources/snoot_club/activity/range?start={begin}&end={end}"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_time_range");
}

#[tokio::test]
async fn test_member_count_update_is_visible() {
    let app = test_app();

    let (status, source) = put_json(
        app.app(),
        "/api/v1/sources/snoot_palace/members",
        json!({ "member_count": 175 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source["member_count"], 175);

    let (_, sources) = get(app.app(), "/api/v1/sources").await;
    assert_eq!(sources["total_count"], 2);
    let palace = sources["sources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "snoot_palace")
        .unwrap();
    assert_eq!(palace["member_count"], 175);
}

#[tokio::test]
async fn test_spike_is_logged_above_threshold_only() {
    let app = test_app();
    // Exactly at the threshold is not a spike.
    app.send_messages("snoot_palace", 15, 3).await;
    app.tick();

    let (_, logs) = get(app.app(), "/api/v1/logs?kind=activity_spike").await;
    assert_eq!(logs["total_count"], 0);

    app.advance(Duration::seconds(60));
    app.send_messages("snoot_palace", 16, 3).await;
    app.tick();

    let (status, logs) = get(app.app(), "/api/v1/logs?kind=activity_spike").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total_count"], 1);
    let message = logs["logs"][0]["message"].as_str().unwrap();
    assert!(message.contains("snoot_palace"));
}

#[tokio::test]
async fn test_latest_activity_missing_is_404() {
    let app = test_app();
    let (status, response) = get(app.app(), "/api/v1/sources/snoot_palace/activity/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "not_found");
}
