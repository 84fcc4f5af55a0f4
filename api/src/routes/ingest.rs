//! Agent-compatible intake endpoints.
//!
//! Every endpoint takes the raw request body plus its content headers, tags
//! it with the endpoint's datatype and hands it to the engine.
//!
//! # Endpoints
//!
//! - `POST /v1/input`, `POST /v1/input/{api_key}`, `POST /api/v2/logs` - logs
//! - `POST /api/v1/series` - metrics
//! - `POST /api/v0.2/traces` - traces
//!
//! A payload that fails to decode is rejected as a whole. When
//! acknowledgements are enabled the response also reflects sink delivery.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::codec::{ContentHeaders, DecodeError, Payload};
use shared::event::DataType;
use shared::pipeline::IngestReport;
use shared::sink::DeliveryStatus;
use thiserror::Error;

/// Response for an accepted payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Events decoded from the payload.
    pub accepted: usize,
    /// Terminal events handed to the sinks.
    pub emitted: usize,
    /// Events dropped by the pipeline.
    pub dropped: usize,
    /// Events discarded after a transform error.
    pub errored: usize,
}

impl From<&IngestReport> for IngestResponse {
    fn from(report: &IngestReport) -> Self {
        Self {
            accepted: report.accepted,
            emitted: report.emitted,
            dropped: report.dropped,
            errored: report.errored,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code.
    pub code: u16,
    /// Error message.
    pub message: String,
}

/// Reasons a payload is refused.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A sink refused the events.
    #[error("Delivery rejected: {0}")]
    DeliveryRejected(String),

    /// A sink failed to deliver the events.
    #[error("Delivery failed: {0}")]
    DeliveryErrored(String),
}

impl IngestError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(DecodeError::UnsupportedEncoding(_) | DecodeError::UnsupportedContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Decode(DecodeError::Compression { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Decode(_) | Self::DeliveryRejected(_) => StatusCode::BAD_REQUEST,
            Self::DeliveryErrored(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(ApiError {
                code: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Creates the intake routes for every datatype that is not disabled.
pub fn ingest_routes(state: AppState) -> Router {
    let config = state.config();
    let mut router = Router::new();

    if !config.disable_logs {
        router = router
            .route("/v1/input", post(ingest_logs))
            .route("/v1/input/{api_key}", post(ingest_logs))
            .route("/api/v2/logs", post(ingest_logs));
    }
    if !config.disable_metrics {
        router = router.route("/api/v1/series", post(ingest_series));
    }
    if !config.disable_traces {
        router = router.route("/api/v0.2/traces", post(ingest_traces));
    }

    router.with_state(state)
}

fn content_headers(headers: &HeaderMap) -> ContentHeaders {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ContentHeaders {
        content_encoding: value(header::CONTENT_ENCODING),
        content_type: value(header::CONTENT_TYPE),
    }
}

async fn ingest(
    state: &AppState,
    data_type: DataType,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    let payload = Payload::new(data_type, body, content_headers(headers));
    let report = state.engine().ingest(&payload).await?;

    if state.config().acknowledgements {
        match report.delivery.status() {
            DeliveryStatus::Rejected { message } => {
                return Err(IngestError::DeliveryRejected(message))
            }
            DeliveryStatus::Errored { message } => {
                return Err(IngestError::DeliveryErrored(message))
            }
            DeliveryStatus::Partial { rejected, message } => {
                tracing::warn!(rejected, message = %message, "Payload partially delivered");
            }
            DeliveryStatus::Delivered => {}
        }
    }

    Ok(Json(IngestResponse::from(&report)))
}

/// Handler for log intake.
async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    ingest(&state, DataType::Log, &headers, body).await
}

/// Handler for metric series intake.
async fn ingest_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    ingest(&state, DataType::Metric, &headers, body).await
}

/// Handler for trace intake.
async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    ingest(&state, DataType::Trace, &headers, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (
                IngestError::Decode(DecodeError::UnsupportedEncoding("br".to_string())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                IngestError::Decode(DecodeError::UnsupportedContentType(
                    "text/plain".to_string(),
                )),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                IngestError::Decode(DecodeError::Compression {
                    encoding: "gzip".to_string(),
                    source: std::io::Error::other("corrupt deflate stream"),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                IngestError::Decode(DecodeError::InvalidRecord {
                    index: 2,
                    reason: "expected an object".to_string(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                IngestError::DeliveryRejected("HTTP 403".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                IngestError::DeliveryErrored("timeout".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn test_content_headers_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/x-protobuf".parse().unwrap());
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

        let content = content_headers(&headers);

        assert_eq!(content.content_type.as_deref(), Some("application/x-protobuf"));
        assert_eq!(content.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(content_headers(&HeaderMap::new()), ContentHeaders::default());
    }
}
