//! Integration tests for the health check.

use axum::http::StatusCode;
use serde_json::json;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let app = test_app(json!([]));

    let (status, response) = get(app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "telepipe-api");
    assert_eq!(response["pipeline_version"], 1);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(json!([]));

    let (status, _) = get(app.router, "/api/v1/logs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
