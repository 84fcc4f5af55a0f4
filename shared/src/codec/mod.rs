//! Wire codecs for ingress and egress.
//!
//! Ingested payloads arrive as raw bytes tagged with a datatype and content
//! headers. [`decode`] undoes the content encoding and hands the body to the
//! codec for that datatype's intake protocol. Decoding is all-or-nothing: a
//! payload either yields its complete sequence of events or a single
//! [`DecodeError`].
//!
//! On the way out, [`encode`] turns events into a batch for a destination
//! [`Protocol`], refusing events whose datatype the protocol cannot carry.

pub mod compression;
pub mod logs;
pub mod metrics;
pub mod native;
pub mod traces;

pub use compression::Compression;

use crate::event::{DataType, DataTypeSet, Event, MetricType};
use crate::telemetry;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// Content type for protobuf payloads.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Content type for JSON payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Source type stamped on events decoded from agent payloads.
pub const SOURCE_TYPE_DATADOG_AGENT: &str = "datadog_agent";

/// Errors raised while decoding an ingested payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The content encoding is not supported.
    #[error("Unsupported encoding {0}")]
    UnsupportedEncoding(String),

    /// The compressed stream is corrupt.
    #[error("Failed decompressing payload with {encoding} decoder: {source}")]
    Compression {
        /// The encoding that failed.
        encoding: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The content type does not match the protocol.
    #[error("Unsupported content type '{0}'")]
    UnsupportedContentType(String),

    /// The body is not valid JSON for the protocol.
    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is not valid protobuf for the protocol.
    #[error("Failed to decode protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// A record inside the payload is malformed.
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord {
        /// Position of the record in the payload.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

impl DecodeError {
    /// Returns a short, stable label for counters.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnsupportedEncoding(_) => "unsupported_encoding",
            Self::Compression { .. } => "compression",
            Self::UnsupportedContentType(_) => "unsupported_content_type",
            Self::Json(_) => "json",
            Self::Protobuf(_) => "protobuf",
            Self::InvalidRecord { .. } => "invalid_record",
        }
    }

    pub(crate) fn invalid(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors raised while encoding a batch for a destination.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The protocol cannot carry events of this datatype.
    #[error("{protocol} cannot encode {data_type} events")]
    IncompatibleDataType {
        /// The destination protocol.
        protocol: Protocol,
        /// The offending datatype.
        data_type: DataType,
    },

    /// The protocol cannot carry this kind of metric.
    #[error("{protocol} cannot encode {metric_type} metric '{name}'")]
    UnsupportedMetric {
        /// The destination protocol.
        protocol: Protocol,
        /// The metric name.
        name: String,
        /// The metric type.
        metric_type: MetricType,
    },

    /// The batch holds something the protocol has no place for.
    #[error("{protocol} cannot represent the batch: {reason}")]
    Unrepresentable {
        /// The destination protocol.
        protocol: Protocol,
        /// What could not be represented.
        reason: String,
    },

    /// JSON serialization failed.
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Compressing the batch failed.
    #[error("Failed to compress batch: {0}")]
    Compression(#[from] std::io::Error),
}

/// Content metadata delivered alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentHeaders {
    /// The `Content-Encoding` header value.
    pub content_encoding: Option<String>,
    /// The `Content-Type` header value.
    pub content_type: Option<String>,
}

impl ContentHeaders {
    /// Creates headers with the given content type.
    #[must_use]
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_encoding: None,
            content_type: Some(content_type.into()),
        }
    }

    /// Sets the content encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }
}

/// A raw ingested payload.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The datatype the sender declared for this payload.
    pub data_type: DataType,
    /// The raw (possibly compressed) body.
    pub body: Bytes,
    /// Content headers.
    pub headers: ContentHeaders,
}

impl Payload {
    /// Creates a new payload.
    #[must_use]
    pub fn new(data_type: DataType, body: impl Into<Bytes>, headers: ContentHeaders) -> Self {
        Self {
            data_type,
            body: body.into(),
            headers,
        }
    }
}

/// A wire protocol events can be decoded from or encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// JSON log intake.
    DatadogLogs,
    /// JSON metric series intake.
    DatadogSeries,
    /// Protobuf trace intake.
    DatadogTraces,
    /// Lossless JSON form of any event.
    NativeJson,
}

impl Protocol {
    /// Returns the protocol name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DatadogLogs => "datadog_logs",
            Self::DatadogSeries => "datadog_series",
            Self::DatadogTraces => "datadog_traces",
            Self::NativeJson => "native_json",
        }
    }

    /// Returns the intake protocol used for a datatype.
    #[must_use]
    pub const fn intake(data_type: DataType) -> Self {
        match data_type {
            DataType::Log => Self::DatadogLogs,
            DataType::Metric => Self::DatadogSeries,
            DataType::Trace => Self::DatadogTraces,
        }
    }

    /// Returns the datatypes this protocol can carry.
    #[must_use]
    pub const fn accepts(&self) -> DataTypeSet {
        match self {
            Self::DatadogLogs => DataTypeSet::LOG,
            Self::DatadogSeries => DataTypeSet::METRIC,
            Self::DatadogTraces => DataTypeSet::TRACE,
            Self::NativeJson => DataTypeSet::ALL,
        }
    }

    /// Returns the content type of encoded batches.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::DatadogTraces => CONTENT_TYPE_PROTOBUF,
            Self::DatadogLogs | Self::DatadogSeries | Self::NativeJson => CONTENT_TYPE_JSON,
        }
    }

    fn codec(self) -> &'static dyn Codec {
        match self {
            Self::DatadogLogs => &logs::DatadogLogsCodec,
            Self::DatadogSeries => &metrics::DatadogSeriesCodec,
            Self::DatadogTraces => &traces::DatadogTracesCodec,
            Self::NativeJson => &native::NativeJsonCodec,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format-specific decoding and encoding for one protocol.
///
/// Bodies handed to [`Codec::decode`] are already decompressed.
pub trait Codec: Send + Sync {
    /// Decodes a body into events, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if any part of the body is malformed.
    fn decode(&self, body: &[u8], headers: &ContentHeaders) -> Result<Vec<Event>, DecodeError>;

    /// Encodes events into a body.
    ///
    /// # Errors
    ///
    /// Returns an error if an event cannot be represented in the protocol.
    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError>;
}

/// Decodes a payload with the intake protocol of its declared datatype.
///
/// # Errors
///
/// Returns a [`DecodeError`] if decompression or decoding fails. No events
/// are returned in that case.
pub fn decode(payload: &Payload) -> Result<Vec<Event>, DecodeError> {
    decode_as(Protocol::intake(payload.data_type), payload)
}

/// Decodes a payload with an explicit protocol.
///
/// Every decoded event must match the payload's declared datatype.
///
/// # Errors
///
/// Returns a [`DecodeError`] if decompression or decoding fails, or if a
/// decoded event has a different datatype than declared.
pub fn decode_as(protocol: Protocol, payload: &Payload) -> Result<Vec<Event>, DecodeError> {
    let result = compression::decompress(
        payload.body.clone(),
        payload.headers.content_encoding.as_deref(),
    )
    .and_then(|body| protocol.codec().decode(&body, &payload.headers))
    .and_then(|events| {
        match events
            .iter()
            .position(|event| event.data_type() != payload.data_type)
        {
            Some(index) => Err(DecodeError::invalid(
                index,
                format!("expected a {} event", payload.data_type),
            )),
            None => Ok(events),
        }
    });

    match result {
        Ok(events) => {
            telemetry::events_received(payload.data_type, events.len());
            Ok(events)
        }
        Err(error) => {
            telemetry::decode_error(payload.data_type, error.reason());
            tracing::error!(
                error = %error,
                data_type = %payload.data_type,
                %protocol,
                "Failed to decode payload"
            );
            Err(error)
        }
    }
}

/// An encoded batch ready for delivery.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    /// The protocol the batch is encoded in.
    pub protocol: Protocol,
    /// The body's content type.
    pub content_type: &'static str,
    /// The body's content encoding, if compressed.
    pub content_encoding: Option<&'static str>,
    /// The encoded body.
    pub body: Bytes,
    /// Number of events in the batch.
    pub event_count: usize,
}

/// Encodes events for a destination protocol.
///
/// # Errors
///
/// Returns [`EncodeError::IncompatibleDataType`] if any event's datatype is not
/// carried by the protocol, or another [`EncodeError`] if encoding fails.
pub fn encode(
    events: &[Event],
    protocol: Protocol,
    compression: Compression,
) -> Result<EncodedBatch, EncodeError> {
    let result = check_compatible(events, protocol)
        .and_then(|()| protocol.codec().encode(events))
        .and_then(|body| Ok(compression.compress(body)?));

    match result {
        Ok(body) => Ok(EncodedBatch {
            protocol,
            content_type: protocol.content_type(),
            content_encoding: compression.content_encoding(),
            body: body.into(),
            event_count: events.len(),
        }),
        Err(error) => {
            telemetry::encode_error(protocol.as_str());
            tracing::warn!(error = %error, %protocol, "Failed to encode batch");
            Err(error)
        }
    }
}

/// Splits events into the batches a protocol needs to carry them.
///
/// A trace payload names one host and one env, so trace events are grouped by
/// those attributes in order of first appearance. Every other protocol takes
/// the events as a single batch.
#[must_use]
pub fn split_batch(events: &[Event], protocol: Protocol) -> Vec<Cow<'_, [Event]>> {
    match protocol {
        Protocol::DatadogTraces => traces::group_by_origin(events),
        Protocol::DatadogLogs | Protocol::DatadogSeries | Protocol::NativeJson => {
            vec![Cow::Borrowed(events)]
        }
    }
}

/// Decodes an encoded batch back into events.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the batch cannot be decompressed or decoded.
pub fn decode_batch(batch: &EncodedBatch) -> Result<Vec<Event>, DecodeError> {
    let headers = ContentHeaders {
        content_encoding: batch.content_encoding.map(str::to_string),
        content_type: Some(batch.content_type.to_string()),
    };
    let body = compression::decompress(batch.body.clone(), batch.content_encoding)?;
    batch.protocol.codec().decode(&body, &headers)
}

fn check_compatible(events: &[Event], protocol: Protocol) -> Result<(), EncodeError> {
    let accepts = protocol.accepts();
    match events
        .iter()
        .find(|event| !accepts.contains(event.data_type()))
    {
        Some(event) => Err(EncodeError::IncompatibleDataType {
            protocol,
            data_type: event.data_type(),
        }),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogEvent, MetricEvent, Span, TraceEvent};

    #[test]
    fn test_protocol_accepts() {
        assert!(Protocol::DatadogLogs.accepts().contains(DataType::Log));
        assert!(!Protocol::DatadogLogs.accepts().contains(DataType::Metric));
        assert_eq!(Protocol::NativeJson.accepts(), DataTypeSet::ALL);
        assert_eq!(Protocol::intake(DataType::Trace), Protocol::DatadogTraces);
    }

    #[test]
    fn test_encode_rejects_metric_into_trace_protocol() {
        let events = vec![Event::from(MetricEvent::counter("hits", 1.0))];

        let result = encode(&events, Protocol::DatadogTraces, Compression::None);

        assert!(matches!(
            result,
            Err(EncodeError::IncompatibleDataType {
                protocol: Protocol::DatadogTraces,
                data_type: DataType::Metric
            })
        ));
    }

    #[test]
    fn test_encode_rejects_mixed_batch() {
        let events = vec![
            Event::from(LogEvent::new().with_field("message", "ok")),
            Event::from(TraceEvent::apm_event(Span::new(1, 2, "op", "svc"))),
        ];

        let result = encode(&events, Protocol::DatadogLogs, Compression::None);

        assert!(matches!(
            result,
            Err(EncodeError::IncompatibleDataType {
                data_type: DataType::Trace,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_batch_metadata() {
        let events = vec![Event::from(LogEvent::new().with_field("message", "ok"))];

        let batch = encode(&events, Protocol::DatadogLogs, Compression::Gzip).unwrap();

        assert_eq!(batch.event_count, 1);
        assert_eq!(batch.content_type, CONTENT_TYPE_JSON);
        assert_eq!(batch.content_encoding, Some("gzip"));
    }

    #[test]
    fn test_decode_batch_inverts_encode() {
        let events = vec![
            Event::from(TraceEvent::apm_event(Span::new(3, 4, "op", "svc"))),
            Event::from(
                TraceEvent::aggregate(5, vec![Span::new(5, 6, "root", "svc")])
                    .with_attribute("host", "web-1"),
            ),
        ];

        let batch = encode(&events, Protocol::DatadogTraces, Compression::Gzip).unwrap();
        let decoded = decode_batch(&batch).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_trace().unwrap().trace_id, 5);
        assert_eq!(decoded[1].as_trace().unwrap().trace_id, 3);
    }

    #[test]
    fn test_decode_rejects_wrong_declared_datatype() {
        let events = vec![Event::from(MetricEvent::gauge("cpu", 0.3))];
        let body = serde_json::to_vec(&events).unwrap();
        let payload = Payload::new(
            DataType::Log,
            body,
            ContentHeaders::with_content_type(CONTENT_TYPE_JSON),
        );

        let result = decode_as(Protocol::NativeJson, &payload);

        assert!(matches!(
            result,
            Err(DecodeError::InvalidRecord { index: 0, .. })
        ));
    }

    #[test]
    fn test_decode_gzip_payload() {
        let body = br#"[{"message": "compressed", "timestamp": 1700000000000}]"#.to_vec();
        let compressed = Compression::Gzip.compress(body).unwrap();
        let payload = Payload::new(
            DataType::Log,
            compressed,
            ContentHeaders::with_content_type(CONTENT_TYPE_JSON).encoding("gzip"),
        );

        let events = decode(&payload).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].lookup("message"),
            Some(crate::event::Value::from("compressed"))
        );
    }

    #[test]
    fn test_decode_corrupt_gzip_is_compression_error() {
        let payload = Payload::new(
            DataType::Log,
            b"definitely not gzip".to_vec(),
            ContentHeaders::with_content_type(CONTENT_TYPE_JSON).encoding("gzip"),
        );

        assert!(matches!(
            decode(&payload),
            Err(DecodeError::Compression { .. })
        ));
    }

    #[test]
    fn test_decode_error_reason_labels() {
        assert_eq!(
            DecodeError::UnsupportedEncoding("br".into()).reason(),
            "unsupported_encoding"
        );
        assert_eq!(DecodeError::invalid(3, "bad").reason(), "invalid_record");
    }
}
