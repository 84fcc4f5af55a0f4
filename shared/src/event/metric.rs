//! Metric event model.
//!
//! Defines the `MetricEvent` structure and the value shapes a metric can carry.

use super::EventMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use validator::Validate;

/// Type of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// A counter that only increases (e.g., request count).
    Counter,
    /// A gauge that can go up or down (e.g., temperature, memory usage).
    Gauge,
    /// A histogram with pre-aggregated buckets.
    Histogram,
    /// Raw samples of a distribution.
    Distribution,
    /// A set of unique values.
    Set,
    /// Pre-computed quantiles.
    Summary,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Histogram => write!(f, "histogram"),
            Self::Distribution => write!(f, "distribution"),
            Self::Set => write!(f, "set"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// A histogram bucket for distribution metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (inclusive).
    pub upper_bound: f64,
    /// The count of observations in this bucket.
    pub count: u64,
}

/// A single distribution sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// The observed value.
    pub value: f64,
    /// How many times the value was observed.
    pub rate: u32,
}

/// A summary quantile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantile {
    /// The quantile, between 0 and 1.
    pub quantile: f64,
    /// The value at that quantile.
    pub value: f64,
}

/// The value of a metric, which varies by metric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricValue {
    /// A monotonic count.
    Counter {
        /// The counted amount.
        value: f64,
    },
    /// A point-in-time measurement.
    Gauge {
        /// The measured value.
        value: f64,
    },
    /// Unique values seen.
    Set {
        /// The set members.
        values: BTreeSet<String>,
    },
    /// Raw samples.
    Distribution {
        /// The samples, in arrival order.
        samples: Vec<Sample>,
    },
    /// Bucketed observations.
    Histogram {
        /// The buckets, ascending by upper bound.
        buckets: Vec<HistogramBucket>,
        /// The total count of observations.
        count: u64,
        /// The sum of all observed values.
        sum: f64,
    },
    /// Quantile summary.
    Summary {
        /// The quantiles.
        quantiles: Vec<Quantile>,
        /// The total count of observations.
        count: u64,
        /// The sum of all observed values.
        sum: f64,
    },
}

impl MetricValue {
    /// Returns the metric type for this value.
    #[must_use]
    pub const fn metric_type(&self) -> MetricType {
        match self {
            Self::Counter { .. } => MetricType::Counter,
            Self::Gauge { .. } => MetricType::Gauge,
            Self::Set { .. } => MetricType::Set,
            Self::Distribution { .. } => MetricType::Distribution,
            Self::Histogram { .. } => MetricType::Histogram,
            Self::Summary { .. } => MetricType::Summary,
        }
    }

    /// Returns the scalar value for counters and gauges.
    #[must_use]
    pub const fn scalar(&self) -> Option<f64> {
        match self {
            Self::Counter { value } | Self::Gauge { value } => Some(*value),
            _ => None,
        }
    }
}

/// A metric data point.
///
/// # Example
///
/// ```
/// use shared::event::{MetricEvent, MetricType};
///
/// let metric = MetricEvent::counter("http_requests_total", 1234.0)
///     .with_tag("method", "GET")
///     .with_tag("status", "200");
///
/// assert_eq!(metric.metric_type(), MetricType::Counter);
/// assert!(metric.validate_metric().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricEvent {
    /// The name of the metric (e.g., "`http_requests_total`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// Optional namespace prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// The metric value.
    pub value: MetricValue,

    /// Tags (dimensions) for the metric.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// When the metric was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// The flush interval the value covers, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u32>,

    /// Event metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// Errors that can occur during metric validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// Histogram has invalid buckets.
    #[error("Histogram buckets must be sorted in ascending order")]
    InvalidHistogramBuckets,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricEvent {
    /// Creates a new metric without a timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            value,
            tags: BTreeMap::new(),
            timestamp: None,
            interval_ms: None,
            metadata: EventMetadata::new(),
        }
    }

    /// Creates a new counter metric.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Counter { value })
    }

    /// Creates a new gauge metric.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Gauge { value })
    }

    /// Adds a tag to the metric.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the namespace of the metric.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the timestamp of the metric.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the interval of the metric.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u32) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the metric type.
    #[must_use]
    pub const fn metric_type(&self) -> MetricType {
        self.value.metric_type()
    }

    /// Validates the metric.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - Histogram buckets are not sorted
    pub fn validate_metric(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }

        if let MetricValue::Histogram { ref buckets, .. } = self.value {
            if buckets
                .windows(2)
                .any(|pair| pair[1].upper_bound <= pair[0].upper_bound)
            {
                return Err(MetricValidationError::InvalidHistogramBuckets);
            }
        }

        self.validate()?;
        Ok(())
    }
}
