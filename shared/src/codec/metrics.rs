//! JSON metric series intake.
//!
//! The body is `{"series": [...]}` where every series carries a metric name,
//! a type, tags and a list of `[timestamp_seconds, value]` points. Each point
//! becomes one metric event.
//!
//! The wire has no namespace field. Encoding folds a namespace into the name as
//! `namespace.name`, and decoding keeps the dotted name with no namespace.

use super::{Codec, ContentHeaders, DecodeError, EncodeError, Protocol, SOURCE_TYPE_DATADOG_AGENT};
use crate::event::{Event, EventMetadata, MetricEvent, MetricValue};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag receiving the series `host` field.
pub const HOST_TAG: &str = "host";

#[derive(Debug, Serialize, Deserialize)]
struct SeriesPayload {
    series: Vec<Series>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Series {
    metric: String,
    #[serde(default, rename = "type")]
    metric_type: SeriesType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
    points: Vec<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SeriesType {
    Count,
    #[default]
    Gauge,
    Rate,
}

/// Codec for the `datadog_series` protocol.
///
/// Rates are converted to counters over their interval on the way in. Only
/// counters and gauges can be encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatadogSeriesCodec;

impl Codec for DatadogSeriesCodec {
    fn decode(&self, body: &[u8], _headers: &ContentHeaders) -> Result<Vec<Event>, DecodeError> {
        let payload: SeriesPayload = serde_json::from_slice(body)?;
        let metadata = EventMetadata::new().with_source_type(SOURCE_TYPE_DATADOG_AGENT);

        let mut events = Vec::new();
        for (index, series) in payload.series.into_iter().enumerate() {
            if series.metric.is_empty() {
                return Err(DecodeError::invalid(index, "metric name cannot be empty"));
            }
            let tags = parse_tags(series.tags.unwrap_or_default(), series.host);

            for (timestamp, value) in series.points {
                #[allow(clippy::cast_possible_truncation)]
                let timestamp = DateTime::from_timestamp(timestamp as i64, 0).ok_or_else(|| {
                    DecodeError::invalid(index, format!("timestamp {timestamp} is out of range"))
                })?;
                let value = match series.metric_type {
                    SeriesType::Count => MetricValue::Counter { value },
                    SeriesType::Gauge => MetricValue::Gauge { value },
                    SeriesType::Rate => MetricValue::Counter {
                        value: value * f64::from(series.interval.unwrap_or(1).max(1)),
                    },
                };

                let mut metric = MetricEvent::new(series.metric.clone(), value)
                    .with_timestamp(timestamp)
                    .with_metadata(metadata.clone());
                metric.tags.clone_from(&tags);
                if let Some(interval) = series.interval {
                    metric.interval_ms = Some(interval.saturating_mul(1000));
                }
                events.push(Event::Metric(metric));
            }
        }
        Ok(events)
    }

    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        let series = events
            .iter()
            .map(|event| {
                let metric = event.as_metric().ok_or(EncodeError::IncompatibleDataType {
                    protocol: Protocol::DatadogSeries,
                    data_type: event.data_type(),
                })?;
                to_series(metric)
            })
            .collect::<Result<Vec<_>, EncodeError>>()?;

        Ok(serde_json::to_vec(&SeriesPayload { series })?)
    }
}

fn parse_tags(tags: Vec<String>, host: Option<String>) -> BTreeMap<String, String> {
    let mut parsed: BTreeMap<String, String> = tags
        .into_iter()
        .map(|tag| match tag.split_once(':') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag, String::new()),
        })
        .collect();
    if let Some(host) = host {
        parsed.insert(HOST_TAG.to_string(), host);
    }
    parsed
}

fn to_series(metric: &MetricEvent) -> Result<Series, EncodeError> {
    let (metric_type, value) = match metric.value {
        MetricValue::Counter { value } => (SeriesType::Count, value),
        MetricValue::Gauge { value } => (SeriesType::Gauge, value),
        _ => {
            return Err(EncodeError::UnsupportedMetric {
                protocol: Protocol::DatadogSeries,
                name: metric.name.clone(),
                metric_type: metric.metric_type(),
            })
        }
    };

    let mut tags = metric.tags.clone();
    let host = tags.remove(HOST_TAG);
    let tags: Vec<String> = tags
        .into_iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key
            } else {
                format!("{key}:{value}")
            }
        })
        .collect();

    let name = match &metric.namespace {
        Some(namespace) => format!("{namespace}.{}", metric.name),
        None => metric.name.clone(),
    };
    #[allow(clippy::cast_precision_loss)]
    let timestamp = metric
        .timestamp
        .unwrap_or(metric.metadata.ingest_timestamp)
        .timestamp() as f64;

    Ok(Series {
        metric: name,
        metric_type,
        interval: metric.interval_ms.map(|ms| ms / 1000),
        points: vec![(timestamp, value)],
        tags: (!tags.is_empty()).then_some(tags),
        host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_util::normalize;
    use crate::event::{MetricType, Value};

    fn decode(body: &str) -> Result<Vec<Event>, DecodeError> {
        DatadogSeriesCodec.decode(body.as_bytes(), &ContentHeaders::default())
    }

    #[test]
    fn test_decode_series() {
        let events = decode(
            r#"{"series": [
                {"metric": "requests", "type": "count", "points": [[1700000000, 5.0], [1700000010, 7.0]],
                 "tags": ["env:prod", "canary"], "host": "web-1"},
                {"metric": "cpu", "type": "gauge", "points": [[1700000000, 0.25]]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(events.len(), 3);
        let first = events[0].as_metric().unwrap();
        assert_eq!(first.name, "requests");
        assert_eq!(first.value, MetricValue::Counter { value: 5.0 });
        assert_eq!(first.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(first.tags.get("canary").map(String::as_str), Some(""));
        assert_eq!(first.tags.get("host").map(String::as_str), Some("web-1"));
        assert_eq!(first.timestamp.unwrap().timestamp(), 1_700_000_000);

        assert_eq!(events[1].as_metric().unwrap().timestamp.unwrap().timestamp(), 1_700_000_010);
        assert_eq!(events[2].as_metric().unwrap().metric_type(), MetricType::Gauge);
        assert_eq!(events[2].lookup("value"), Some(Value::Float(0.25)));
    }

    #[test]
    fn test_decode_rate_becomes_counter() {
        let events = decode(
            r#"{"series": [{"metric": "rps", "type": "rate", "interval": 10, "points": [[1700000000, 2.5]]}]}"#,
        )
        .unwrap();

        let metric = events[0].as_metric().unwrap();
        assert_eq!(metric.value, MetricValue::Counter { value: 25.0 });
        assert_eq!(metric.interval_ms, Some(10_000));
    }

    #[test]
    fn test_decode_missing_type_is_gauge() {
        let events =
            decode(r#"{"series": [{"metric": "temp", "points": [[1700000000, 21.5]]}]}"#).unwrap();
        assert_eq!(events[0].as_metric().unwrap().metric_type(), MetricType::Gauge);
    }

    #[test]
    fn test_decode_empty_name_rejects_payload() {
        let result = decode(
            r#"{"series": [
                {"metric": "ok", "points": [[1700000000, 1.0]]},
                {"metric": "", "points": [[1700000000, 1.0]]}
            ]}"#,
        );
        assert!(matches!(
            result,
            Err(DecodeError::InvalidRecord { index: 1, .. })
        ));
    }

    #[test]
    fn test_decode_malformed_point() {
        let result = decode(r#"{"series": [{"metric": "x", "points": [[1700000000]]}]}"#);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_encode_decode_preserves_counters_and_gauges() {
        let original = decode(
            r#"{"series": [
                {"metric": "requests", "type": "count", "interval": 10, "points": [[1700000000, 5.0]],
                 "tags": ["env:prod", "canary"], "host": "web-1"},
                {"metric": "cpu", "type": "gauge", "points": [[1700000000, 0.25]]}
            ]}"#,
        )
        .unwrap();

        let body = DatadogSeriesCodec.encode(&original).unwrap();
        let decoded = DatadogSeriesCodec
            .decode(&body, &ContentHeaders::default())
            .unwrap();

        assert_eq!(normalize(decoded), normalize(original));
    }

    #[test]
    fn test_encode_rejects_histogram() {
        let events = vec![Event::from(MetricEvent::new(
            "latency",
            MetricValue::Histogram {
                buckets: vec![],
                count: 0,
                sum: 0.0,
            },
        ))];

        let result = DatadogSeriesCodec.encode(&events);

        assert!(matches!(
            result,
            Err(EncodeError::UnsupportedMetric {
                metric_type: MetricType::Histogram,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_prefixes_namespace() {
        let events = vec![Event::from(
            MetricEvent::gauge("load", 1.0).with_namespace("system"),
        )];

        let body = DatadogSeriesCodec.encode(&events).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["series"][0]["metric"], "system.load");
        assert_eq!(json["series"][0]["type"], "gauge");
    }

    #[test]
    fn test_namespace_is_folded_into_name() {
        let events = vec![Event::from(
            MetricEvent::counter("hits", 3.0).with_namespace("app"),
        )];

        let body = DatadogSeriesCodec.encode(&events).unwrap();
        let decoded = DatadogSeriesCodec
            .decode(&body, &ContentHeaders::default())
            .unwrap();

        let metric = decoded[0].as_metric().unwrap();
        assert_eq!(metric.name, "app.hits");
        assert_eq!(metric.namespace, None);
        assert_eq!(metric.value, MetricValue::Counter { value: 3.0 });
    }
}
