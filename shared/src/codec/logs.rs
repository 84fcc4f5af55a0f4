//! JSON log intake.
//!
//! The body is a JSON array of objects. Each object becomes one log event with
//! its keys as top-level fields. The `timestamp` key carries integer
//! milliseconds since the epoch on the wire and a timestamp value in the event.
//! Any other timestamp value is written as an RFC 3339 string and reads back
//! as a string.

use super::{Codec, ContentHeaders, DecodeError, EncodeError, Protocol, SOURCE_TYPE_DATADOG_AGENT};
use crate::event::{Event, EventMetadata, LogEvent, Value};
use chrono::DateTime;
use std::collections::BTreeMap;

/// Field holding the record timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Codec for the `datadog_logs` protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatadogLogsCodec;

impl Codec for DatadogLogsCodec {
    fn decode(&self, body: &[u8], _headers: &ContentHeaders) -> Result<Vec<Event>, DecodeError> {
        let records: Vec<serde_json::Value> = serde_json::from_slice(body)?;
        let metadata = EventMetadata::new().with_source_type(SOURCE_TYPE_DATADOG_AGENT);

        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let serde_json::Value::Object(object) = record else {
                    return Err(DecodeError::invalid(index, "expected a JSON object"));
                };

                let mut fields = BTreeMap::new();
                for (key, value) in object {
                    let value = if key == TIMESTAMP_KEY {
                        timestamp_from_millis(&value).ok_or_else(|| {
                            DecodeError::invalid(index, "timestamp must be integer milliseconds")
                        })?
                    } else {
                        Value::from_json(value)
                    };
                    fields.insert(key, value);
                }

                Ok(Event::Log(
                    LogEvent::from_fields(fields).with_metadata(metadata.clone()),
                ))
            })
            .collect()
    }

    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        let records = events
            .iter()
            .map(|event| {
                let log = event.as_log().ok_or(EncodeError::IncompatibleDataType {
                    protocol: Protocol::DatadogLogs,
                    data_type: event.data_type(),
                })?;
                Ok(serde_json::Value::Object(
                    log.fields
                        .iter()
                        .map(|(key, value)| (key.clone(), field_to_json(key, value)))
                        .collect(),
                ))
            })
            .collect::<Result<Vec<_>, EncodeError>>()?;

        Ok(serde_json::to_vec(&records)?)
    }
}

fn timestamp_from_millis(value: &serde_json::Value) -> Option<Value> {
    value
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .map(Value::Timestamp)
}

fn field_to_json(key: &str, value: &Value) -> serde_json::Value {
    match value {
        Value::Timestamp(ts) if key == TIMESTAMP_KEY => ts.timestamp_millis().into(),
        other => other.to_json(),
    }
}
