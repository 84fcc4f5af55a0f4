//! The `compound` transform: a reusable, nestable chain of steps.
//!
//! ```json
//! { "kind": "compound", "steps": [
//!     { "kind": "filter", "condition": { "equals": { "field": "level", "value": "debug" } } },
//!     { "kind": "remap", "operations": [{ "op": "remove", "field": "level" }] }
//! ] }
//! ```
//!
//! Steps run with the same fail-fast law as the top-level pipeline (see
//! [`Chain`]). The steps list must be non-empty and every step must be able to
//! receive something its predecessor emits.

use super::{Chain, Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::{DataTypeSet, Event};
use serde::Deserialize;
use validator::Validate;

/// Kind name.
pub const KIND: &str = "compound";

/// Options of the `compound` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CompoundOptions {
    /// Nested steps, in execution order.
    pub steps: Vec<TransformConfig>,
}

/// A transform running an owned chain of child transforms.
#[derive(Debug)]
pub struct Compound {
    chain: Chain,
}

impl Compound {
    /// Wraps a built chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptySteps`] for an empty chain and
    /// [`ConfigError::InconsistentTypes`] if adjacent steps cannot exchange
    /// any datatype.
    pub fn new(chain: Chain) -> Result<Self, ConfigError> {
        if chain.is_empty() {
            return Err(ConfigError::EmptySteps);
        }
        chain.check_types()?;
        Ok(Self { chain })
    }

    /// The child chain.
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl Transform for Compound {
    fn input(&self) -> DataTypeSet {
        self.chain.input()
    }

    fn output(&self) -> DataTypeSet {
        self.chain.output()
    }

    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        self.chain.run(event)
    }
}

/// Builds a `compound` step, building its children through the registry.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the options are malformed, the steps list is
/// empty, a child fails to build or the children's types are inconsistent.
pub fn build(
    config: &TransformConfig,
    registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    let options: CompoundOptions = config.parse_options()?;
    if options.steps.is_empty() {
        return Err(ConfigError::EmptySteps);
    }
    let chain = registry.build_chain(&options.steps)?;
    Ok(Box::new(Compound::new(chain)?))
}
