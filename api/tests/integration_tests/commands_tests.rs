//! Integration tests for bot command execution and the command audit log.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use super::common::{execute, get, put_json, test_app};

#[tokio::test]
async fn test_activity_before_any_tick_is_not_ready() {
    let app = test_app();

    let (status, reply) = execute(app.app(), "/activity").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["success"], false);
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("No activity data available yet"));
    assert!(text.contains("snoot_palace"));
}

#[tokio::test]
async fn test_activity_after_tick_reports_multiplier() {
    let app = test_app();
    app.send_messages("snoot_palace", 10, 5).await;
    app.send_messages("snoot_club", 10, 5).await;
    app.tick();

    let (status, reply) = execute(app.app(), "/activity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], true);
    assert_eq!(reply["command"], "activity");

    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("Server Activity Comparison"));
    assert!(text.contains("Snoot Palace: 10.0 msg/min, 5 active users, 150 members"));
    assert!(text.contains("33.33x activity multiplier"));
    assert!(text.contains("Snoot Palace is 3233% more active per capita"));
    assert_eq!(reply["data"]["leader"], "snoot_palace");
}

#[tokio::test]
async fn test_compare_variants() {
    let app = test_app();
    app.send_messages("snoot_palace", 6, 3).await;
    app.send_messages("snoot_club", 20, 8).await;
    app.tick();

    let (status, reply) = execute(app.app(), "compare messages").await;
    assert_eq!(status, StatusCode::OK);
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("Messages Comparison"));
    assert!(text.contains("Difference: -14.0 msg/min"));

    let (_, reply) = execute(app.app(), "/compare users").await;
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("Active Users Comparison"));
    assert!(text.contains("Difference: -5 users"));

    let (_, reply) = execute(app.app(), "/compare per_capita").await;
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("Per Capita Activity Comparison"));
    assert!(text.contains("Ratio: "));
}

#[tokio::test]
async fn test_history_summarizes_timeframe() {
    let app = test_app();
    for count in [4, 8] {
        app.send_messages("snoot_club", count, 2).await;
        app.tick();
        app.advance(Duration::seconds(59));
    }

    let (status, reply) = execute(app.app(), "/history 1h").await;
    assert_eq!(status, StatusCode::OK);
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("Activity History (1h)"));
    assert!(text.contains("Snoot Club: 6.0 avg msg/min, 8.0 peak msg/min, 2 data points"));
}

#[tokio::test]
async fn test_history_without_data_fails() {
    let app = test_app();

    let (status, reply) = execute(app.app(), "/history 24h").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["text"], "No historical data available for 24h.");
}

#[tokio::test]
async fn test_status_lists_reported_processes() {
    let app = test_app();

    let (_, reply) = execute(app.app(), "/status").await;
    assert!(reply["text"]
        .as_str()
        .unwrap()
        .contains("No processes have reported yet."));

    let (status, _) = put_json(
        app.app(),
        "/api/v1/bots/status/relay_bot",
        json!({ "name": "Relay Bot", "status": "online" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, reply) = execute(app.app(), "/status").await;
    assert_eq!(status, StatusCode::OK);
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("System Status"));
    assert!(text.contains("Relay Bot"));
    assert!(!text.contains("[stale]"));
}

#[tokio::test]
async fn test_unknown_command_is_rejected_and_audited() {
    let app = test_app();

    let (status, reply) = execute(app.app(), "/dance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply["text"].as_str().unwrap().contains("Unknown command"));

    let (status, log) = get(app.app(), "/api/v1/commands").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["total_count"], 1);
    assert_eq!(log["commands"][0]["command"], "/dance");
    assert_eq!(log["commands"][0]["actor_id"], "tester");
    assert_eq!(log["commands"][0]["success"], false);
}

#[tokio::test]
async fn test_successful_command_writes_audit_entries() {
    let app = test_app();
    app.tick();

    let (status, _) = execute(app.app(), "/activity").await;
    assert_eq!(status, StatusCode::OK);

    let (_, log) = get(app.app(), "/api/v1/commands").await;
    assert_eq!(log["total_count"], 1);
    assert_eq!(log["commands"][0]["command"], "activity");
    assert_eq!(log["commands"][0]["success"], true);

    let (_, logs) = get(app.app(), "/api/v1/logs?kind=command_executed").await;
    assert_eq!(logs["total_count"], 1);
    assert_eq!(logs["logs"][0]["message"], "/activity command used by tester");
}
