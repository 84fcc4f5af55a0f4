//! Event model for the Telepipe pipeline.
//!
//! An [`Event`] is one of three telemetry shapes: a log, a metric or a trace.
//! The variant is the event's datatype and stays fixed for the event's whole
//! lifetime; only transforms that declare a conversion may emit a different one.

pub mod log;
pub mod metric;
pub mod trace;
pub mod value;

pub use log::LogEvent;
pub use metric::{
    HistogramBucket, MetricEvent, MetricType, MetricValidationError, MetricValue, Quantile,
    Sample,
};
pub use trace::{Span, SpanStatus, SpanValidationError, TraceEvent, TraceRecordKind};
pub use value::Value;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// The datatype of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Log records.
    Log,
    /// Metric data points.
    Metric,
    /// Spans and traces.
    Trace,
}

impl DataType {
    /// All datatypes, in a stable order.
    pub const ALL: [Self; 3] = [Self::Log, Self::Metric, Self::Trace];

    /// Returns the lowercase name of the datatype.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Metric => "metric",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "logs" => Ok(Self::Log),
            "metric" | "metrics" => Ok(Self::Metric),
            "trace" | "traces" => Ok(Self::Trace),
            other => Err(format!("unknown datatype '{other}'")),
        }
    }
}

/// A set of datatypes.
///
/// Used by transforms to declare what they accept and emit, and by sinks to
/// declare what they can encode. Serialized as a list of datatype names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<DataType>", into = "Vec<DataType>")]
pub struct DataTypeSet(u8);

impl DataTypeSet {
    /// The empty set.
    pub const NONE: Self = Self(0);
    /// Logs only.
    pub const LOG: Self = Self(1);
    /// Metrics only.
    pub const METRIC: Self = Self(1 << 1);
    /// Traces only.
    pub const TRACE: Self = Self(1 << 2);
    /// Every datatype.
    pub const ALL: Self = Self(0b111);

    /// Returns the single-element set for a datatype.
    #[must_use]
    pub const fn of(data_type: DataType) -> Self {
        match data_type {
            DataType::Log => Self::LOG,
            DataType::Metric => Self::METRIC,
            DataType::Trace => Self::TRACE,
        }
    }

    /// Returns true if the set contains the datatype.
    #[must_use]
    pub const fn contains(self, data_type: DataType) -> bool {
        self.0 & Self::of(data_type).0 != 0
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if the sets share at least one datatype.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the datatypes in the set.
    pub fn iter(self) -> impl Iterator<Item = DataType> {
        DataType::ALL
            .into_iter()
            .filter(move |data_type| self.contains(*data_type))
    }
}

impl From<DataType> for DataTypeSet {
    fn from(data_type: DataType) -> Self {
        Self::of(data_type)
    }
}

impl From<Vec<DataType>> for DataTypeSet {
    fn from(types: Vec<DataType>) -> Self {
        types
            .into_iter()
            .fold(Self::NONE, |set, data_type| set.union(Self::of(data_type)))
    }
}

impl From<DataTypeSet> for Vec<DataType> {
    fn from(set: DataTypeSet) -> Self {
        set.iter().collect()
    }
}

impl std::fmt::Display for DataTypeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::ALL {
            return f.write_str("any");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(|t| t.as_str()).collect();
        f.write_str(&names.join("|"))
    }
}

/// Metadata attached to every event, outside of its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// When the node received the event.
    pub ingest_timestamp: DateTime<Utc>,

    /// The kind of source that produced the event (e.g. `datadog_agent`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    /// Tags describing where the event came from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_tags: BTreeMap<String, String>,

    /// Route name assigned by a `route` transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl EventMetadata {
    /// Creates metadata stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ingest_timestamp: Utc::now(),
            source_type: None,
            source_tags: BTreeMap::new(),
            route: None,
        }
    }

    /// Sets the source type.
    #[must_use]
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    /// Adds a source tag.
    #[must_use]
    pub fn with_source_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.source_tags.insert(key.into(), value.into());
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of telemetry flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// A log record.
    Log(LogEvent),
    /// A metric data point.
    Metric(MetricEvent),
    /// A trace aggregate or a selected span.
    Trace(TraceEvent),
}

impl Event {
    /// Returns the datatype of this event.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Log(_) => DataType::Log,
            Self::Metric(_) => DataType::Metric,
            Self::Trace(_) => DataType::Trace,
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn metadata(&self) -> &EventMetadata {
        match self {
            Self::Log(log) => &log.metadata,
            Self::Metric(metric) => &metric.metadata,
            Self::Trace(trace) => &trace.metadata,
        }
    }

    /// Returns the event metadata mutably.
    pub fn metadata_mut(&mut self) -> &mut EventMetadata {
        match self {
            Self::Log(log) => &mut log.metadata,
            Self::Metric(metric) => &mut metric.metadata,
            Self::Trace(trace) => &mut trace.metadata,
        }
    }

    /// Returns the log if this is a log event.
    #[must_use]
    pub const fn as_log(&self) -> Option<&LogEvent> {
        match self {
            Self::Log(log) => Some(log),
            _ => None,
        }
    }

    /// Returns the metric if this is a metric event.
    #[must_use]
    pub const fn as_metric(&self) -> Option<&MetricEvent> {
        match self {
            Self::Metric(metric) => Some(metric),
            _ => None,
        }
    }

    /// Returns the trace if this is a trace event.
    #[must_use]
    pub const fn as_trace(&self) -> Option<&TraceEvent> {
        match self {
            Self::Trace(trace) => Some(trace),
            _ => None,
        }
    }

    /// Looks up a named field in a datatype-aware way.
    ///
    /// - logs: the field path itself
    /// - metrics: `name`, `namespace`, `value` (counter/gauge) or `tags.<key>`
    /// - traces: `trace_id`, `service` (first span), `name` (first span) or
    ///   `attributes.<path>`
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Value> {
        match self {
            Self::Log(log) => log.get(path).cloned(),
            Self::Metric(metric) => match path {
                "name" => Some(Value::from(metric.name.as_str())),
                "namespace" => metric.namespace.as_deref().map(Value::from),
                "value" => metric.value.scalar().map(Value::Float),
                _ => path
                    .strip_prefix("tags.")
                    .and_then(|key| metric.tags.get(key))
                    .map(|v| Value::from(v.as_str())),
            },
            Self::Trace(trace) => match path {
                #[allow(clippy::cast_possible_wrap)]
                "trace_id" => Some(Value::Integer(trace.trace_id as i64)),
                "service" => trace.spans.first().map(|s| Value::from(s.service.as_str())),
                "name" => trace.spans.first().map(|s| Value::from(s.name.as_str())),
                _ => path
                    .strip_prefix("attributes.")
                    .and_then(|p| value::get_path(&trace.attributes, p))
                    .cloned(),
            },
        }
    }
}

impl From<LogEvent> for Event {
    fn from(log: LogEvent) -> Self {
        Self::Log(log)
    }
}

impl From<MetricEvent> for Event {
    fn from(metric: MetricEvent) -> Self {
        Self::Metric(metric)
    }
}

impl From<TraceEvent> for Event {
    fn from(trace: TraceEvent) -> Self {
        Self::Trace(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_data_type() {
        let log: Event = LogEvent::new().with_field("message", "hi").into();
        let metric: Event = MetricEvent::counter("requests", 1.0).into();
        let trace: Event = TraceEvent::apm_event(Span::new(1, 2, "op", "svc")).into();

        assert_eq!(log.data_type(), DataType::Log);
        assert_eq!(metric.data_type(), DataType::Metric);
        assert_eq!(trace.data_type(), DataType::Trace);
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("logs".parse::<DataType>(), Ok(DataType::Log));
        assert_eq!("Metric".parse::<DataType>(), Ok(DataType::Metric));
        assert_eq!("traces".parse::<DataType>(), Ok(DataType::Trace));
        assert!("events".parse::<DataType>().is_err());
    }

    #[test]
    fn test_data_type_set_operations() {
        let set = DataTypeSet::LOG.union(DataTypeSet::TRACE);

        assert!(set.contains(DataType::Log));
        assert!(!set.contains(DataType::Metric));
        assert!(set.intersects(DataTypeSet::TRACE));
        assert!(!set.intersects(DataTypeSet::METRIC));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![DataType::Log, DataType::Trace]);
        assert!(DataTypeSet::NONE.is_empty());
    }

    #[test]
    fn test_data_type_set_display() {
        assert_eq!(DataTypeSet::ALL.to_string(), "any");
        assert_eq!(DataTypeSet::LOG.union(DataTypeSet::METRIC).to_string(), "log|metric");
        assert_eq!(DataTypeSet::NONE.to_string(), "none");
    }

    #[test]
    fn test_data_type_set_serde() {
        let set: DataTypeSet = serde_json::from_str(r#"["metric", "trace"]"#).unwrap();
        assert_eq!(set, DataTypeSet::METRIC.union(DataTypeSet::TRACE));

        let json = serde_json::to_string(&DataTypeSet::LOG).unwrap();
        assert_eq!(json, r#"["log"]"#);
    }

    #[test]
    fn test_event_lookup_by_datatype() {
        let log: Event = LogEvent::new().with_field("http.status", 500).into();
        assert_eq!(log.lookup("http.status"), Some(Value::Integer(500)));

        let metric: Event = MetricEvent::gauge("cpu", 0.5).with_tag("host", "a").into();
        assert_eq!(metric.lookup("name"), Some(Value::from("cpu")));
        assert_eq!(metric.lookup("tags.host"), Some(Value::from("a")));
        assert_eq!(metric.lookup("value"), Some(Value::Float(0.5)));

        let trace: Event = TraceEvent::apm_event(Span::new(7, 8, "GET /", "web")).into();
        assert_eq!(trace.lookup("service"), Some(Value::from("web")));
        assert_eq!(
            trace.lookup("attributes.record_kind"),
            Some(Value::from("apm_event"))
        );
    }

    #[test]
    fn test_event_serde_is_tagged() {
        let event: Event = LogEvent::new().with_field("message", "hello").into();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "log");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
