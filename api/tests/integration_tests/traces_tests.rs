//! Integration tests for trace intake.

use axum::http::StatusCode;
use serde_json::json;
use shared::codec::{self, Compression, Protocol};
use shared::event::{Event, Span, TraceEvent, TraceRecordKind, Value};

use super::common::{post_bytes, test_app};

fn trace_payload(compression: Compression) -> Vec<u8> {
    let events = vec![
        Event::from(TraceEvent::aggregate(
            7,
            vec![
                Span::new(7, 1, "GET /users", "frontend"),
                Span::new(7, 2, "SELECT users", "db").with_parent(1),
            ],
        )),
        Event::from(TraceEvent::apm_event(Span::new(
            9, 3, "POST /login", "auth",
        ))),
    ];
    codec::encode(&events, Protocol::DatadogTraces, compression)
        .unwrap()
        .body
        .to_vec()
}

#[tokio::test]
async fn test_aggregates_and_apm_events_stay_distinct() {
    let app = test_app(json!([]));

    let (status, response) = post_bytes(
        app.router,
        "/api/v0.2/traces",
        &[("content-type", "application/x-protobuf")],
        trace_payload(Compression::None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["accepted"], 2);

    let events = app.sink.events().unwrap();
    let kinds: Vec<_> = events
        .iter()
        .map(|event| event.as_trace().unwrap().record_kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(TraceRecordKind::Aggregate),
            Some(TraceRecordKind::ApmEvent)
        ]
    );
    assert_eq!(events[0].as_trace().unwrap().spans.len(), 2);
}

#[tokio::test]
async fn test_route_apm_events_only() {
    let app = test_app(json!([
        {"kind": "filter", "condition": {"equals": {"field": "attributes.record_kind", "value": "apm_event"}}}
    ]));

    let (status, response) = post_bytes(
        app.router,
        "/api/v0.2/traces",
        &[
            ("content-type", "application/x-protobuf"),
            ("content-encoding", "gzip"),
        ],
        trace_payload(Compression::Gzip),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["emitted"], 1);
    assert_eq!(response["dropped"], 1);
    let events = app.sink.events().unwrap();
    assert_eq!(events[0].lookup("service"), Some(Value::from("auth")));
}

#[tokio::test]
async fn test_wrong_content_type_is_415() {
    let app = test_app(json!([]));

    let (status, response) = post_bytes(
        app.router,
        "/api/v0.2/traces",
        &[("content-type", "application/json")],
        trace_payload(Compression::None),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response["code"], 415);
    assert!(app.sink.batches().unwrap().is_empty());
}

#[tokio::test]
async fn test_garbage_protobuf_is_400() {
    let app = test_app(json!([]));

    let (status, _) = post_bytes(
        app.router,
        "/api/v0.2/traces",
        &[("content-type", "application/x-protobuf")],
        vec![0xff, 0xff, 0xff, 0xff],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
