//! Integration tests for log intake.
//!
//! Tests cover:
//! - Filtering and reformatting through the pipeline
//! - Compressed payloads and content encoding errors
//! - Whole-payload rejection on malformed records
//! - Per-event transform errors
//! - Delivery acknowledgements

use api::Config;
use axum::http::StatusCode;
use serde_json::json;
use shared::codec::Compression;
use shared::event::Value;
use shared::sink::{DeliveryStatus, MemorySink};

use super::common::{post_bytes, post_json, test_app, test_app_with};

fn filter_then_reformat() -> serde_json::Value {
    json!([
        {"kind": "filter", "condition": {"equals": {"field": "level", "value": "debug"}}},
        {"kind": "remap", "operations": [
            {"op": "set", "field": "message", "value": "[{{level}}] {{message}}"},
            {"op": "remove", "field": "level"}
        ]}
    ])
}

fn noisy_and_normal() -> serde_json::Value {
    json!([
        {"level": "debug", "message": "I'm a noisy debug log"},
        {"level": "info", "message": "I'm a normal info log"}
    ])
}

#[tokio::test]
async fn test_filter_then_reformat() {
    let app = test_app(filter_then_reformat());

    let (status, response) = post_json(app.router, "/api/v2/logs", noisy_and_normal()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        json!({"accepted": 2, "emitted": 1, "dropped": 1, "errored": 0})
    );

    let events = app.sink.events().unwrap();
    assert_eq!(events.len(), 1);
    let log = events[0].as_log().unwrap();
    assert_eq!(log.fields.len(), 1);
    assert_eq!(
        log.get("message"),
        Some(&Value::from("[debug] I'm a noisy debug log"))
    );
}

#[tokio::test]
async fn test_all_log_routes() {
    for uri in ["/v1/input", "/v1/input/0123456789abcdef", "/api/v2/logs"] {
        let app = test_app(json!([]));

        let (status, response) = post_json(app.router, uri, noisy_and_normal()).await;

        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(response["emitted"], 2, "{uri}");
    }
}

#[tokio::test]
async fn test_gzip_payload() {
    let app = test_app(json!([]));
    let body = Compression::Gzip
        .compress(serde_json::to_vec(&noisy_and_normal()).unwrap())
        .unwrap();

    let (status, response) = post_bytes(
        app.router,
        "/api/v2/logs",
        &[("content-type", "application/json"), ("content-encoding", "gzip")],
        body,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["accepted"], 2);
}

#[tokio::test]
async fn test_unsupported_encoding_is_415() {
    let app = test_app(json!([]));

    let (status, response) = post_bytes(
        app.router,
        "/api/v2/logs",
        &[("content-encoding", "br")],
        b"[]".to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response["code"], 415);
    assert!(response["message"].as_str().unwrap().contains("br"));
}

#[tokio::test]
async fn test_corrupt_gzip_is_422() {
    let app = test_app(json!([]));

    let (status, _) = post_bytes(
        app.router,
        "/api/v2/logs",
        &[("content-encoding", "gzip")],
        b"definitely not gzip".to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.sink.batches().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_record_rejects_whole_payload() {
    let app = test_app(json!([]));

    let (status, response) = post_json(
        app.router,
        "/api/v2/logs",
        json!([{"message": "fine"}, "not an object"]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 400);
    assert!(app.sink.batches().unwrap().is_empty());
}

#[tokio::test]
async fn test_transform_error_discards_only_that_event() {
    let app = test_app(json!([{"kind": "unbatch", "field": "items"}]));

    let (status, response) = post_json(
        app.router,
        "/api/v2/logs",
        json!([
            {"message": "no items"},
            {"message": "two items", "items": ["a", "b"]}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        json!({"accepted": 2, "emitted": 2, "dropped": 0, "errored": 1})
    );
    assert_eq!(app.sink.events().unwrap().len(), 2);
}

#[tokio::test]
async fn test_acknowledgements_map_delivery_failures() {
    let config = Config {
        acknowledgements: true,
        ..Config::default()
    };
    let cases = [
        (
            DeliveryStatus::Rejected {
                message: "quota".to_string(),
            },
            StatusCode::BAD_REQUEST,
        ),
        (
            DeliveryStatus::Errored {
                message: "collector down".to_string(),
            },
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (DeliveryStatus::Delivered, StatusCode::OK),
    ];

    for (delivery, expected) in cases {
        let sink = MemorySink::new().with_status(delivery);
        let app = test_app_with(json!([]), config.clone(), sink);

        let (status, _) = post_json(app.router, "/api/v2/logs", noisy_and_normal()).await;

        assert_eq!(status, expected);
    }
}

#[tokio::test]
async fn test_without_acknowledgements_delivery_failure_is_accepted() {
    let sink = MemorySink::new().with_status(DeliveryStatus::Errored {
        message: "collector down".to_string(),
    });
    let app = test_app_with(json!([]), Config::default(), sink);

    let (status, response) = post_json(app.router, "/api/v2/logs", noisy_and_normal()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["emitted"], 2);
}
