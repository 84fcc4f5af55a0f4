//! The `unbatch` transform splits an array field into one log per element.

use super::{Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::{DataType, DataTypeSet, Event, Value};
use serde::Deserialize;
use validator::Validate;

/// Kind name.
pub const KIND: &str = "unbatch";

/// Options of the `unbatch` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UnbatchOptions {
    /// Path of the array field.
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub field: String,
}

/// Emits one copy of the log per array element, with the field replaced by
/// that element. An empty array drops the log.
#[derive(Debug, Clone)]
pub struct Unbatch {
    field: String,
}

impl Unbatch {
    /// Creates an unbatcher for the field.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Transform for Unbatch {
    fn input(&self) -> DataTypeSet {
        DataTypeSet::LOG
    }

    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        let mut log = match event {
            Event::Log(log) => log,
            other => {
                return Err(TransformError::UnsupportedDataType {
                    kind: KIND.to_string(),
                    data_type: other.data_type(),
                })
            }
        };

        let items = match log.remove(&self.field) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(TransformError::InvalidField {
                    field: self.field.clone(),
                    expected: "array",
                    found: other.kind_name(),
                    data_type: DataType::Log,
                })
            }
            None => {
                return Err(TransformError::MissingField {
                    field: self.field.clone(),
                    data_type: DataType::Log,
                })
            }
        };

        Ok(items
            .into_iter()
            .map(|item| {
                let mut copy = log.clone();
                copy.insert(&self.field, item);
                Event::Log(copy)
            })
            .collect())
    }
}

/// Builds an `unbatch` step.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] if `field` is missing or empty.
pub fn build(
    config: &TransformConfig,
    _registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    let options: UnbatchOptions = config.parse_options()?;
    Ok(Box::new(Unbatch::new(options.field)))
}
