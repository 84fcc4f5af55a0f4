//! Protobuf trace intake.
//!
//! A trace payload carries two kinds of records: `traces`, each holding every
//! span of one trace, and `transactions`, single spans selected as APM events.
//! Aggregates are decoded before APM events, each group in payload order.
//!
//! The payload names a single host and env, which become the `host` and `env`
//! attributes of every decoded trace. Any other trace attribute travels as a
//! JSON object under [`ATTRIBUTES_META_KEY`] in the meta of the trace's first
//! span, and is lifted back into the attributes on decode.

use super::{
    Codec, ContentHeaders, DecodeError, EncodeError, Protocol, CONTENT_TYPE_PROTOBUF,
    SOURCE_TYPE_DATADOG_AGENT,
};
use crate::event::trace::RECORD_KIND_KEY;
use crate::event::{Event, EventMetadata, Span, SpanStatus, TraceEvent, TraceRecordKind, Value};
use chrono::DateTime;
use prost::Message;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Trace attribute receiving the payload host name.
pub const HOST_ATTRIBUTE: &str = "host";

/// Trace attribute receiving the payload environment.
pub const ENV_ATTRIBUTE: &str = "env";

/// Span meta key carrying the remaining trace attributes.
pub const ATTRIBUTES_META_KEY: &str = "_telepipe.attributes";

/// The host and env a trace was sent from.
type Origin<'a> = (Option<&'a str>, Option<&'a str>);

/// Top-level trace payload.
#[derive(Clone, PartialEq, Message)]
pub struct TracePayload {
    /// Host that sent the payload.
    #[prost(string, tag = "1")]
    pub host_name: String,
    /// Deployment environment.
    #[prost(string, tag = "2")]
    pub env: String,
    /// Trace aggregates.
    #[prost(message, repeated, tag = "3")]
    pub traces: Vec<ApiTrace>,
    /// Selected spans.
    #[prost(message, repeated, tag = "4")]
    pub transactions: Vec<WireSpan>,
}

/// One trace and all of its spans.
#[derive(Clone, PartialEq, Message)]
pub struct ApiTrace {
    /// The trace ID.
    #[prost(uint64, tag = "1")]
    pub trace_id: u64,
    /// The trace's spans.
    #[prost(message, repeated, tag = "2")]
    pub spans: Vec<WireSpan>,
    /// Start of the trace, nanoseconds since the epoch.
    #[prost(int64, tag = "6")]
    pub start_time: i64,
    /// End of the trace, nanoseconds since the epoch.
    #[prost(int64, tag = "7")]
    pub end_time: i64,
}

/// A span as encoded on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct WireSpan {
    /// Service name.
    #[prost(string, tag = "1")]
    pub service: String,
    /// Operation name.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Resource name.
    #[prost(string, tag = "3")]
    pub resource: String,
    /// Trace ID.
    #[prost(uint64, tag = "4")]
    pub trace_id: u64,
    /// Span ID.
    #[prost(uint64, tag = "5")]
    pub span_id: u64,
    /// Parent span ID, zero for roots.
    #[prost(uint64, tag = "6")]
    pub parent_id: u64,
    /// Start, nanoseconds since the epoch.
    #[prost(int64, tag = "7")]
    pub start: i64,
    /// Duration in nanoseconds.
    #[prost(int64, tag = "8")]
    pub duration: i64,
    /// Non-zero if the span failed.
    #[prost(int32, tag = "9")]
    pub error: i32,
    /// String tags.
    #[prost(btree_map = "string, string", tag = "10")]
    pub meta: BTreeMap<String, String>,
    /// Numeric tags.
    #[prost(btree_map = "string, double", tag = "11")]
    pub metrics: BTreeMap<String, f64>,
    /// Span type.
    #[prost(string, tag = "12")]
    pub r#type: String,
}

/// Codec for the `datadog_traces` protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatadogTracesCodec;

impl Codec for DatadogTracesCodec {
    fn decode(&self, body: &[u8], headers: &ContentHeaders) -> Result<Vec<Event>, DecodeError> {
        match headers.content_type.as_deref() {
            Some(content_type) if is_protobuf(content_type) => {}
            other => {
                return Err(DecodeError::UnsupportedContentType(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }

        let payload = TracePayload::decode(body)?;
        let metadata = EventMetadata::new().with_source_type(SOURCE_TYPE_DATADOG_AGENT);
        let aggregate_count = payload.traces.len();

        let aggregates = payload.traces.into_iter().enumerate().map(|(index, trace)| {
            let spans = trace
                .spans
                .into_iter()
                .map(|span| from_wire(span, index))
                .collect::<Result<Vec<_>, _>>()?;
            let mut event = TraceEvent::aggregate(trace.trace_id, spans);
            event.start_time = from_nanos(trace.start_time);
            event.end_time = from_nanos(trace.end_time);
            Ok(event)
        });
        let apm_events = payload
            .transactions
            .into_iter()
            .enumerate()
            .map(|(offset, span)| {
                from_wire(span, aggregate_count + offset).map(TraceEvent::apm_event)
            });

        aggregates
            .chain(apm_events)
            .enumerate()
            .map(|(index, event): (usize, Result<TraceEvent, DecodeError>)| {
                let mut event = event?;
                restore_attributes(&mut event, index)?;
                if !payload.host_name.is_empty() {
                    event = event.with_attribute(HOST_ATTRIBUTE, payload.host_name.as_str());
                }
                if !payload.env.is_empty() {
                    event = event.with_attribute(ENV_ATTRIBUTE, payload.env.as_str());
                }
                event.metadata = metadata.clone();
                Ok(Event::Trace(event))
            })
            .collect()
    }

    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        let traces = events
            .iter()
            .map(|event| {
                event.as_trace().ok_or(EncodeError::IncompatibleDataType {
                    protocol: Protocol::DatadogTraces,
                    data_type: event.data_type(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut payload = TracePayload::default();
        if let Some(first) = traces.first() {
            let (host, env) = origin(first);
            if traces.iter().any(|trace| origin(trace) != (host, env)) {
                return Err(unrepresentable(
                    "traces from more than one host or env share a payload",
                ));
            }
            payload.host_name = host.unwrap_or_default().to_string();
            payload.env = env.unwrap_or_default().to_string();
        }

        for trace in traces {
            let mut spans: Vec<WireSpan> = trace.spans.iter().map(to_wire).collect();
            let carried = carried_attributes(trace);
            if !carried.is_empty() {
                let span = spans.first_mut().ok_or_else(|| {
                    unrepresentable(format!(
                        "trace {} has attributes but no span to carry them",
                        trace.trace_id
                    ))
                })?;
                span.meta
                    .insert(ATTRIBUTES_META_KEY.to_string(), serde_json::to_string(&carried)?);
            }

            match trace.record_kind() {
                Some(TraceRecordKind::ApmEvent) => payload.transactions.extend(spans),
                Some(TraceRecordKind::Aggregate) | None => payload.traces.push(ApiTrace {
                    trace_id: trace.trace_id,
                    spans,
                    start_time: to_nanos(trace.start_time),
                    end_time: to_nanos(trace.end_time),
                }),
            }
        }

        Ok(payload.encode_to_vec())
    }
}

/// Groups trace events by host and env, keeping first-appearance order.
pub(super) fn group_by_origin(events: &[Event]) -> Vec<Cow<'_, [Event]>> {
    let Some(first) = events.first().map(event_origin) else {
        return vec![Cow::Borrowed(events)];
    };
    if events.iter().all(|event| event_origin(event) == first) {
        return vec![Cow::Borrowed(events)];
    }

    let mut groups: Vec<(Origin<'_>, Vec<Event>)> = Vec::new();
    for event in events {
        let key = event_origin(event);
        match groups.iter_mut().find(|(group_origin, _)| *group_origin == key) {
            Some((_, group)) => group.push(event.clone()),
            None => groups.push((key, vec![event.clone()])),
        }
    }
    groups.into_iter().map(|(_, group)| Cow::Owned(group)).collect()
}

fn event_origin(event: &Event) -> Origin<'_> {
    event.as_trace().map(origin).unwrap_or_default()
}

fn origin(trace: &TraceEvent) -> Origin<'_> {
    (
        non_empty_attribute(trace, HOST_ATTRIBUTE),
        non_empty_attribute(trace, ENV_ATTRIBUTE),
    )
}

fn non_empty_attribute<'a>(trace: &'a TraceEvent, key: &str) -> Option<&'a str> {
    trace.attribute_str(key).filter(|value| !value.is_empty())
}

/// Attributes the payload has no field for.
fn carried_attributes(trace: &TraceEvent) -> BTreeMap<&str, &Value> {
    let (host, env) = origin(trace);
    trace
        .attributes
        .iter()
        .filter(|(key, _)| match key.as_str() {
            RECORD_KIND_KEY => false,
            HOST_ATTRIBUTE => host.is_none(),
            ENV_ATTRIBUTE => env.is_none(),
            _ => true,
        })
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

fn restore_attributes(trace: &mut TraceEvent, index: usize) -> Result<(), DecodeError> {
    let Some(carried) = trace
        .spans
        .first_mut()
        .and_then(|span| span.meta.remove(ATTRIBUTES_META_KEY))
    else {
        return Ok(());
    };
    let attributes: BTreeMap<String, Value> = serde_json::from_str(&carried)
        .map_err(|error| DecodeError::invalid(index, format!("bad {ATTRIBUTES_META_KEY}: {error}")))?;
    for (key, value) in attributes {
        trace.attributes.entry(key).or_insert(value);
    }
    Ok(())
}

fn unrepresentable(reason: impl Into<String>) -> EncodeError {
    EncodeError::Unrepresentable {
        protocol: Protocol::DatadogTraces,
        reason: reason.into(),
    }
}

fn is_protobuf(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(CONTENT_TYPE_PROTOBUF))
}

fn from_nanos(nanos: i64) -> Option<DateTime<chrono::Utc>> {
    (nanos != 0).then(|| DateTime::from_timestamp_nanos(nanos))
}

fn to_nanos(timestamp: Option<DateTime<chrono::Utc>>) -> i64 {
    timestamp
        .and_then(|ts| ts.timestamp_nanos_opt())
        .unwrap_or_default()
}

fn from_wire(span: WireSpan, index: usize) -> Result<Span, DecodeError> {
    let span = Span {
        trace_id: span.trace_id,
        span_id: span.span_id,
        parent_id: (span.parent_id != 0).then_some(span.parent_id),
        service: span.service,
        name: span.name,
        resource: span.resource,
        span_type: (!span.r#type.is_empty()).then_some(span.r#type),
        start_time: DateTime::from_timestamp_nanos(span.start),
        duration_nanos: span.duration,
        status: if span.error == 0 {
            SpanStatus::Ok
        } else {
            SpanStatus::Error
        },
        meta: span.meta,
        metrics: span.metrics,
    };
    span.validate_span()
        .map_err(|error| DecodeError::invalid(index, error.to_string()))?;
    Ok(span)
}

fn to_wire(span: &Span) -> WireSpan {
    WireSpan {
        service: span.service.clone(),
        name: span.name.clone(),
        resource: span.resource.clone(),
        trace_id: span.trace_id,
        span_id: span.span_id,
        parent_id: span.parent_id.unwrap_or_default(),
        start: span.start_time.timestamp_nanos_opt().unwrap_or_default(),
        duration: span.duration_nanos,
        error: i32::from(span.status == SpanStatus::Error),
        meta: span.meta.clone(),
        metrics: span.metrics.clone(),
        r#type: span.span_type.clone().unwrap_or_default(),
    }
}
