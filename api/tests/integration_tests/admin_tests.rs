//! Integration tests for pipeline reloads.

use api::Config;
use axum::http::StatusCode;
use serde_json::json;
use shared::event::Value;
use shared::sink::MemorySink;
use std::path::PathBuf;

use super::common::{post_json, test_app_with};

fn write_pipeline(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "telepipe-{name}-{}.json",
        std::process::id()
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

fn tagging_pipeline(stage: &str) -> String {
    json!({
        "transforms": [
            {"kind": "remap", "operations": [{"op": "set", "field": "stage", "value": stage}]}
        ],
        "sinks": [
            {"name": "out", "type": "memory", "protocol": "native_json"}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_reload_swaps_pipeline() {
    let path = write_pipeline("reload-swap", &tagging_pipeline("v2"));
    let config = Config {
        pipeline_config: Some(path.clone()),
        ..Config::default()
    };
    let app = test_app_with(json!([]), config, MemorySink::new());

    let (status, response) = post_json(app.router.clone(), "/admin/reload", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["version"], 2);
    assert_eq!(app.state.engine().version(), 2);

    let (status, _) = post_json(
        app.router,
        "/api/v2/logs",
        json!([{"message": "after reload"}]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = app.sink.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_log().unwrap().get("stage"),
        Some(&Value::from("v2"))
    );

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_broken_reload_keeps_running_pipeline() {
    let path = write_pipeline(
        "reload-broken",
        r#"{"transforms": [{"kind": "teleport"}], "sinks": []}"#,
    );
    let config = Config {
        pipeline_config: Some(path.clone()),
        ..Config::default()
    };
    let app = test_app_with(json!([]), config, MemorySink::new());

    let (status, response) = post_json(app.router.clone(), "/admin/reload", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 400);
    assert_eq!(app.state.engine().version(), 1);

    let (status, response) = post_json(
        app.router,
        "/api/v2/logs",
        json!([{"message": "still flowing"}]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["emitted"], 1);
    assert_eq!(app.sink.events().unwrap().len(), 1);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_reload_without_file_resets_to_passthrough() {
    let app = test_app_with(
        json!([{"kind": "filter", "condition": {"exists": {"field": "never"}}}]),
        Config::default(),
        MemorySink::new(),
    );

    let (status, response) = post_json(app.router, "/admin/reload", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["version"], 2);
    assert!(app.state.engine().snapshot().chain().is_empty());
}
