//! Integration tests for metric series intake.

use axum::http::StatusCode;
use serde_json::json;
use shared::event::{MetricType, MetricValue};

use super::common::{post_json, test_app};

#[tokio::test]
async fn test_series_points_become_metrics() {
    let app = test_app(json!([]));

    let (status, response) = post_json(
        app.router,
        "/api/v1/series",
        json!({"series": [
            {"metric": "system.load.1", "type": "gauge", "points": [[1_700_000_000, 0.5], [1_700_000_010, 0.7]],
             "tags": ["env:prod"], "host": "web-1"},
            {"metric": "requests", "type": "rate", "interval": 10, "points": [[1_700_000_000, 2.5]]}
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["accepted"], 3);

    let events = app.sink.events().unwrap();
    let load = events[0].as_metric().unwrap();
    assert_eq!(load.metric_type(), MetricType::Gauge);
    assert_eq!(load.tags.get("host").map(String::as_str), Some("web-1"));
    assert_eq!(load.tags.get("env").map(String::as_str), Some("prod"));

    let requests = events[2].as_metric().unwrap();
    assert_eq!(requests.value, MetricValue::Counter { value: 25.0 });
}

#[tokio::test]
async fn test_filter_by_metric_name() {
    let app = test_app(json!([
        {"kind": "filter", "condition": {"not": {"equals": {"field": "name", "value": "noise"}}}}
    ]));

    let (status, response) = post_json(
        app.router,
        "/api/v1/series",
        json!({"series": [
            {"metric": "noise", "points": [[1_700_000_000, 1.0]]},
            {"metric": "signal", "points": [[1_700_000_000, 1.0]]}
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["dropped"], 1);
    assert_eq!(response["emitted"], 1);
}

#[tokio::test]
async fn test_invalid_series_document() {
    let app = test_app(json!([]));

    let (status, _) = post_json(app.router, "/api/v1/series", json!([1, 2, 3])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
