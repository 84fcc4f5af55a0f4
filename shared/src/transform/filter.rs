//! The `filter` transform keeps events matching a condition.

use super::condition::{validate_condition, Condition};
use super::{Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::Event;
use serde::Deserialize;
use validator::Validate;

/// Kind name.
pub const KIND: &str = "filter";

/// Options of the `filter` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FilterOptions {
    /// Events matching this condition are kept.
    #[validate(custom(function = "validate_condition"))]
    pub condition: Condition,
}

/// Drops events not matching its condition.
#[derive(Debug, Clone)]
pub struct Filter {
    condition: Condition,
}

impl Filter {
    /// Creates a filter.
    #[must_use]
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }
}

impl Transform for Filter {
    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        if self.condition.matches(&event) {
            Ok(vec![event])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Builds a `filter` step.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] if the condition is missing or
/// malformed.
pub fn build(
    config: &TransformConfig,
    _registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    let options: FilterOptions = config.parse_options()?;
    Ok(Box::new(Filter::new(options.condition)))
}
