//! Integration tests for retention configuration and sweeps.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use super::common::{get, post_json, put_json, test_app};

#[tokio::test]
async fn test_default_retention_is_thirty_days() {
    let app = test_app();

    let (status, response) = get(app.app(), "/api/v1/config/retention").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["config"]["activity_metrics"]["ttl_days"], 30);
}

#[tokio::test]
async fn test_sweep_removes_metrics_past_horizon() {
    let app = test_app();
    app.tick();

    app.advance(Duration::days(31));
    app.tick();

    let (status, report) =
        post_json(app.app(), "/api/v1/config/retention/sweep", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    // One expired metric per source.
    assert_eq!(report["activity_metrics"], 2);

    let (_, activity) = get(app.app(), "/api/v1/sources/snoot_club/activity").await;
    assert_eq!(activity["total_count"], 1);

    // Nothing left to remove.
    let (_, report) = post_json(app.app(), "/api/v1/config/retention/sweep", json!({})).await;
    assert_eq!(report["activity_metrics"], 0);
}

#[tokio::test]
async fn test_policy_update_changes_sweep_horizon() {
    let app = test_app();
    app.tick();
    app.advance(Duration::days(3));

    let (status, response) = put_json(
        app.app(),
        "/api/v1/config/retention/policy",
        json!({ "data_type": "activity_metrics", "ttl_days": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["config"]["activity_metrics"]["ttl_days"], 2);

    let (_, report) = post_json(app.app(), "/api/v1/config/retention/sweep", json!({})).await;
    assert_eq!(report["activity_metrics"], 2);
}

#[tokio::test]
async fn test_invalid_policy_is_rejected() {
    let app = test_app();

    let (status, response) = put_json(
        app.app(),
        "/api/v1/config/retention/policy",
        json!({ "data_type": "system_logs", "ttl_days": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);

    let (_, current) = get(app.app(), "/api/v1/config/retention").await;
    assert_ne!(current["config"]["system_logs"]["ttl_days"], 0);
}
