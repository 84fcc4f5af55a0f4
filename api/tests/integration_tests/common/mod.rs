//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use api::{create_router, AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::codec::Protocol;
use shared::config::{SinkConfig, SinkKind, TransformConfig};
use shared::pipeline::{Engine, Pipeline};
use shared::sink::{MemorySink, RegisteredSink};
use shared::transform::TransformRegistry;
use std::sync::Arc;

/// A router wired to a pipeline whose only sink records into memory.
pub struct TestApp {
    /// The router under test.
    pub router: Router,
    /// The state behind the router.
    pub state: AppState,
    /// Handle on the recording sink.
    pub sink: MemorySink,
}

/// The sink definition every test pipeline delivers to.
pub fn memory_sink_config() -> SinkConfig {
    SinkConfig::new("out", SinkKind::Memory, Protocol::NativeJson)
}

/// Creates a test app running `transforms` with the default server config.
pub fn test_app(transforms: Value) -> TestApp {
    test_app_with(transforms, Config::default(), MemorySink::new())
}

/// Creates a test app with explicit server config and recording sink.
///
/// # Arguments
///
/// * `transforms` - JSON array of transform configurations
/// * `config` - The server configuration
/// * `sink` - The sink events are delivered to
pub fn test_app_with(transforms: Value, config: Config, sink: MemorySink) -> TestApp {
    let registry = Arc::new(TransformRegistry::default());
    let transforms: Vec<TransformConfig> = serde_json::from_value(transforms).unwrap();
    let chain = registry.build_chain(&transforms).unwrap();
    let pipeline = Pipeline::from_parts(
        chain,
        vec![RegisteredSink::new(
            memory_sink_config(),
            Arc::new(sink.clone()),
        )],
    );

    let state = AppState::new(Arc::new(Engine::new(pipeline, registry)), config);
    TestApp {
        router: create_router(state.clone()),
        state,
        sink,
    }
}

/// Helper to make a POST request with raw bytes and headers.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn post_bytes(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method("POST").uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = tower::ServiceExt::oneshot(app, request.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request with JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_bytes(
        app,
        uri,
        &[("content-type", "application/json")],
        serde_json::to_vec(&body).unwrap(),
    )
    .await
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
