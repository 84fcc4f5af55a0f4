//! Event conditions used by `filter` and `route`.
//!
//! Conditions are written as externally tagged JSON objects:
//!
//! ```json
//! { "all": [
//!     { "is_type": "log" },
//!     { "equals": { "field": "level", "value": "debug" } },
//!     { "not": { "exists": { "field": "sampled" } } }
//! ] }
//! ```
//!
//! Field names go through [`Event::lookup`], so they address log field paths,
//! metric `name`/`tags.<key>` and trace `service`/`attributes.<path>`.

use crate::event::{DataType, Event, Value};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::ValidationError;

/// A predicate over events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The field equals the value. Numbers compare by magnitude.
    Equals {
        /// Field to read.
        field: String,
        /// Expected value.
        value: serde_json::Value,
    },
    /// The field is absent or differs from the value.
    NotEquals {
        /// Field to read.
        field: String,
        /// Rejected value.
        value: serde_json::Value,
    },
    /// The field is present.
    Exists {
        /// Field to read.
        field: String,
    },
    /// The field is a string containing `value`, or an array with a string
    /// element equal to `value`.
    Contains {
        /// Field to read.
        field: String,
        /// Substring or element to look for.
        value: String,
    },
    /// The event has this datatype.
    IsType(DataType),
    /// Every nested condition holds.
    All(Vec<Condition>),
    /// At least one nested condition holds.
    Any(Vec<Condition>),
    /// The nested condition does not hold.
    Not(Box<Condition>),
}

impl Condition {
    /// Shorthand for an [`Condition::Equals`] condition.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Shorthand for an [`Condition::Exists`] condition.
    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// Evaluates the condition against an event.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::Equals { field, value } => event
                .lookup(field)
                .is_some_and(|actual| value_equals(&actual, value)),
            Self::NotEquals { field, value } => !event
                .lookup(field)
                .is_some_and(|actual| value_equals(&actual, value)),
            Self::Exists { field } => event.lookup(field).is_some(),
            Self::Contains { field, value } => match event.lookup(field) {
                Some(Value::String(s)) => s.contains(value.as_str()),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str() == Some(value.as_str())),
                _ => false,
            },
            Self::IsType(data_type) => event.data_type() == *data_type,
            Self::All(conditions) => conditions.iter().all(|c| c.matches(event)),
            Self::Any(conditions) => conditions.iter().any(|c| c.matches(event)),
            Self::Not(condition) => !condition.matches(event),
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::Exists { field }
            | Self::Contains { field, .. } => {
                if field.is_empty() {
                    Err("condition field cannot be empty".to_string())
                } else {
                    Ok(())
                }
            }
            Self::IsType(_) => Ok(()),
            Self::All(conditions) | Self::Any(conditions) => {
                if conditions.is_empty() {
                    return Err("all/any need at least one condition".to_string());
                }
                conditions.iter().try_for_each(Self::check)
            }
            Self::Not(condition) => condition.check(),
        }
    }
}

/// `validator` hook for option structs holding a condition.
///
/// # Errors
///
/// Returns a validation error if a field name is empty or an `all`/`any`
/// combinator has no members.
pub fn validate_condition(condition: &Condition) -> Result<(), ValidationError> {
    condition
        .check()
        .map_err(|message| ValidationError::new("condition").with_message(Cow::Owned(message)))
}

#[allow(clippy::float_cmp)]
fn value_equals(actual: &Value, expected: &serde_json::Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual.to_json() == *expected,
    }
}
