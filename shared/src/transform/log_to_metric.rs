//! The `log_to_metric` transform turns each log into a counter.
//!
//! This is the one built-in kind that changes an event's datatype, and it
//! declares so: it accepts logs and emits metrics.

use super::{Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::{DataType, DataTypeSet, Event, MetricEvent, Value};
use crate::codec::logs::TIMESTAMP_KEY;
use serde::Deserialize;
use validator::Validate;

/// Kind name.
pub const KIND: &str = "log_to_metric";

/// Options of the `log_to_metric` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LogToMetricOptions {
    /// Metric name.
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// Metric namespace.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Numeric field to count by. Each log counts 1 when unset.
    #[serde(default)]
    pub field: Option<String>,

    /// Log fields copied into tags, keyed by their path. Absent fields are skipped.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Converts logs into counters.
#[derive(Debug, Clone)]
pub struct LogToMetric {
    options: LogToMetricOptions,
}

impl LogToMetric {
    /// Creates a converter.
    #[must_use]
    pub fn new(options: LogToMetricOptions) -> Self {
        Self { options }
    }
}

impl Transform for LogToMetric {
    fn input(&self) -> DataTypeSet {
        DataTypeSet::LOG
    }

    fn output(&self) -> DataTypeSet {
        DataTypeSet::METRIC
    }

    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        let log = match event {
            Event::Log(log) => log,
            other => {
                return Err(TransformError::UnsupportedDataType {
                    kind: KIND.to_string(),
                    data_type: other.data_type(),
                })
            }
        };

        let value = match &self.options.field {
            None => 1.0,
            Some(field) => match log.get(field) {
                Some(value) => value.as_f64().ok_or_else(|| TransformError::InvalidField {
                    field: field.clone(),
                    expected: "number",
                    found: value.kind_name(),
                    data_type: DataType::Log,
                })?,
                None => {
                    return Err(TransformError::MissingField {
                        field: field.clone(),
                        data_type: DataType::Log,
                    })
                }
            },
        };

        let mut metric = MetricEvent::counter(self.options.name.clone(), value);
        metric.namespace.clone_from(&self.options.namespace);
        for tag in &self.options.tags {
            if let Some(value) = log.get(tag) {
                metric.tags.insert(tag.clone(), value.to_string_lossy());
            }
        }
        if let Some(Value::Timestamp(timestamp)) = log.get(TIMESTAMP_KEY) {
            metric.timestamp = Some(*timestamp);
        }
        metric.metadata = log.metadata;

        Ok(vec![Event::Metric(metric)])
    }
}

/// Builds a `log_to_metric` step.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] if the name is missing or empty.
pub fn build(
    config: &TransformConfig,
    _registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    Ok(Box::new(LogToMetric::new(config.parse_options()?)))
}
