//! Pipeline configuration.
//!
//! A pipeline is described by a JSON document listing the top-level transform
//! steps in order and the sinks terminal events are delivered to:
//!
//! ```json
//! {
//!   "transforms": [{ "kind": "filter", "condition": { "equals": { "field": "level", "value": "debug" } } }],
//!   "sinks": [{ "name": "out", "type": "console", "protocol": "native_json" }]
//! }
//! ```
//!
//! Everything here is resolved at build time. A configuration that fails to
//! build never processes an event.

pub mod sink;
pub mod transform;

pub use sink::{SinkConfig, SinkKind};
pub use transform::TransformConfig;

use crate::codec::Protocol;
use crate::event::DataTypeSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while building a pipeline from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No transform is registered under this kind.
    #[error("Unknown transform kind '{0}'")]
    UnknownKind(String),

    /// The options of a step do not match its kind's schema.
    #[error("Invalid options for '{kind}': {reason}")]
    InvalidOptions {
        /// The transform kind.
        kind: String,
        /// What was wrong.
        reason: String,
    },

    /// A compound transform has no steps.
    #[error("Compound transform must specify at least one step")]
    EmptySteps,

    /// Adjacent compound steps cannot exchange any datatype.
    #[error(
        "Inconsistent types in compound transform: step {index} emits {produced} but step {} accepts {accepted}",
        .index + 1
    )]
    InconsistentTypes {
        /// Index of the producing step.
        index: usize,
        /// What the producing step emits.
        produced: DataTypeSet,
        /// What the following step accepts.
        accepted: DataTypeSet,
    },

    /// A nested step failed to build.
    #[error("Step {index} ({kind}): {source}")]
    Step {
        /// Index of the step.
        index: usize,
        /// Kind of the step.
        kind: String,
        /// The underlying error.
        #[source]
        source: Box<ConfigError>,
    },

    /// A sink definition is invalid.
    #[error("Invalid sink '{name}': {reason}")]
    InvalidSink {
        /// The sink name.
        name: String,
        /// What was wrong.
        reason: String,
    },

    /// Two sinks share a name.
    #[error("Duplicate sink name '{0}'")]
    DuplicateSink(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid JSON for its schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn at_step(self, index: usize, kind: &str) -> Self {
        Self::Step {
            index,
            kind: kind.to_string(),
            source: Box::new(self),
        }
    }
}

/// A complete pipeline description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Top-level transform steps, in execution order.
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,

    /// Sinks receiving terminal events.
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl PipelineConfig {
    /// A pipeline with no transforms and a single console sink.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::config::PipelineConfig;
    ///
    /// let config = PipelineConfig::passthrough();
    /// assert!(config.transforms.is_empty());
    /// assert_eq!(config.sinks.len(), 1);
    /// ```
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            transforms: Vec::new(),
            sinks: vec![SinkConfig::new("console", SinkKind::Console, Protocol::NativeJson)],
        }
    }

    /// Adds a transform step.
    #[must_use]
    pub fn with_transform(mut self, transform: TransformConfig) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
