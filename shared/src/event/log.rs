//! Log event model.
//!
//! A log is an ordered map of fields to typed values plus event metadata.

use super::value::{self, Value};
use super::EventMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structured log record.
///
/// # Example
///
/// ```
/// use shared::event::{LogEvent, Value};
///
/// let log = LogEvent::new()
///     .with_field("message", "User logged in")
///     .with_field("http.status", 200);
///
/// assert_eq!(log.get("http.status"), Some(&Value::Integer(200)));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEvent {
    /// The log's fields.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Event metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl LogEvent {
    /// Creates an empty log event stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log event from an existing field map.
    #[must_use]
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            metadata: EventMetadata::new(),
        }
    }

    /// Sets a field at the given path.
    #[must_use]
    pub fn with_field(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the value at a field path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        value::get_path(&self.fields, path)
    }

    /// Inserts a value at a field path, returning the previous value.
    pub fn insert(&mut self, path: &str, value: impl Into<Value>) -> Option<Value> {
        value::insert_path(&mut self.fields, path, value.into())
    }

    /// Removes the value at a field path.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        value::remove_path(&mut self.fields, path)
    }

    /// Returns true if a value exists at the path.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns true if the log has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
