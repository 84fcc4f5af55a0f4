//! Trace and span event models.
//!
//! A [`TraceEvent`] carries either a whole trace aggregate (every span of one
//! request) or a single selected span (an APM event). The two record kinds
//! share one shape and are told apart by the `record_kind` attribute.

use super::value::Value;
use super::EventMetadata;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Attribute key holding the record kind of a trace event.
pub const RECORD_KIND_KEY: &str = "record_kind";

/// Status code for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The span completed without error.
    #[default]
    Ok,
    /// The span encountered an error.
    Error,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Distinguishes trace aggregates from selected spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceRecordKind {
    /// All spans of one trace.
    Aggregate,
    /// A single span selected for indexing and analysis.
    ApmEvent,
}

impl TraceRecordKind {
    /// Returns the attribute value for this record kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::ApmEvent => "apm_event",
        }
    }
}

impl FromStr for TraceRecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aggregate" => Ok(Self::Aggregate),
            "apm_event" => Ok(Self::ApmEvent),
            other => Err(format!("unknown trace record kind '{other}'")),
        }
    }
}

/// A span representing a unit of work in a distributed trace.
///
/// # Example
///
/// ```
/// use shared::event::{Span, SpanStatus};
///
/// let span = Span::new(123, 456, "http.request", "api-service")
///     .with_resource("GET /api/users")
///     .with_meta("http.method", "GET")
///     .with_status(SpanStatus::Ok);
///
/// assert!(span.validate_span().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Span {
    /// Identifier of the trace this span belongs to.
    pub trace_id: u64,

    /// Identifier of this span.
    pub span_id: u64,

    /// The parent span ID (None for root spans).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,

    /// The service that generated this span.
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service: String,

    /// The operation name.
    #[validate(length(min = 1, message = "Span name cannot be empty"))]
    pub name: String,

    /// The resource the operation acted on (route, query, ...).
    #[serde(default)]
    pub resource: String,

    /// The span type (`web`, `db`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_type: Option<String>,

    /// When the span started.
    pub start_time: DateTime<Utc>,

    /// How long the span lasted, in nanoseconds.
    pub duration_nanos: i64,

    /// The status of the span.
    #[serde(default)]
    pub status: SpanStatus,

    /// String attributes.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,

    /// Numeric attributes.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Errors that can occur during span validation.
#[derive(Debug, Error)]
pub enum SpanValidationError {
    /// The trace ID is zero.
    #[error("Trace ID cannot be zero")]
    EmptyTraceId,

    /// The span ID is zero.
    #[error("Span ID cannot be zero")]
    EmptySpanId,

    /// The span name is empty.
    #[error("Span name cannot be empty")]
    EmptyName,

    /// The service name is empty.
    #[error("Service name cannot be empty")]
    EmptyService,

    /// The duration is negative.
    #[error("Span duration cannot be negative")]
    NegativeDuration,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl Span {
    /// Creates a new root span starting now with zero duration.
    #[must_use]
    pub fn new(
        trace_id: u64,
        span_id: u64,
        name: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_id: None,
            service: service.into(),
            name: name.into(),
            resource: String::new(),
            span_type: None,
            start_time: Utc::now(),
            duration_nanos: 0,
            status: SpanStatus::default(),
            meta: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Sets the parent span ID.
    #[must_use]
    pub fn with_parent(mut self, parent_id: u64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Sets the span type.
    #[must_use]
    pub fn with_span_type(mut self, span_type: impl Into<String>) -> Self {
        self.span_type = Some(span_type.into());
        self
    }

    /// Sets the span status.
    #[must_use]
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_nanos = duration.num_nanoseconds().unwrap_or(i64::MAX);
        self
    }

    /// Adds a string attribute.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Adds a numeric attribute.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Returns the duration of the span.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::nanoseconds(self.duration_nanos)
    }

    /// Returns when the span ended.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration()
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Validates the span.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The trace or span ID is zero
    /// - The name or service is empty
    /// - The duration is negative
    pub fn validate_span(&self) -> Result<(), SpanValidationError> {
        if self.trace_id == 0 {
            return Err(SpanValidationError::EmptyTraceId);
        }
        if self.span_id == 0 {
            return Err(SpanValidationError::EmptySpanId);
        }
        if self.name.is_empty() {
            return Err(SpanValidationError::EmptyName);
        }
        if self.service.is_empty() {
            return Err(SpanValidationError::EmptyService);
        }
        if self.duration_nanos < 0 {
            return Err(SpanValidationError::NegativeDuration);
        }
        self.validate()?;
        Ok(())
    }
}

/// A trace aggregate or a selected span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// The trace ID.
    pub trace_id: u64,

    /// The spans carried by this event.
    pub spans: Vec<Span>,

    /// Start of the trace, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// End of the trace, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Trace-level attributes, always including `record_kind`.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    /// Event metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl TraceEvent {
    fn with_kind(trace_id: u64, spans: Vec<Span>, kind: TraceRecordKind) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(RECORD_KIND_KEY.to_string(), Value::from(kind.as_str()));
        Self {
            trace_id,
            spans,
            start_time: None,
            end_time: None,
            attributes,
            metadata: EventMetadata::new(),
        }
    }

    /// Creates an aggregate holding all spans of one trace.
    #[must_use]
    pub fn aggregate(trace_id: u64, spans: Vec<Span>) -> Self {
        Self::with_kind(trace_id, spans, TraceRecordKind::Aggregate)
    }

    /// Creates an APM event holding one selected span.
    #[must_use]
    pub fn apm_event(span: Span) -> Self {
        Self::with_kind(span.trace_id, vec![span], TraceRecordKind::ApmEvent)
    }

    /// Sets a trace-level attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the trace time range.
    #[must_use]
    pub fn with_time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Returns the record kind, if the attribute is present and valid.
    #[must_use]
    pub fn record_kind(&self) -> Option<TraceRecordKind> {
        self.attributes
            .get(RECORD_KIND_KEY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Returns the root span if it exists.
    #[must_use]
    pub fn root_span(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.is_root())
    }

    /// Returns the number of spans in this event.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Returns all services involved in this trace.
    #[must_use]
    pub fn services(&self) -> Vec<&str> {
        let mut services: Vec<&str> = self.spans.iter().map(|s| s.service.as_str()).collect();
        services.sort_unstable();
        services.dedup();
        services
    }
}
