//! Integration tests for health check and empty-state behavior.

use axum::http::StatusCode;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let (status, response) = get(app.app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "rivalwatch-api");
}

#[tokio::test]
async fn test_empty_state_returns_empty_results() {
    let app = test_app();

    let (status, response) = get(app.app(), "/api/v1/sources/snoot_palace/activity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 0);

    let (status, response) = get(app.app(), "/api/v1/commands").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response["commands"].as_array().unwrap().is_empty());

    let (status, response) = get(app.app(), "/api/v1/bots/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.as_object().unwrap().is_empty());

    let (status, response) = get(app.app(), "/api/v1/streak").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["leadership"]["state"], "no_leader");
    assert_eq!(response["needs_notification"], false);
}
