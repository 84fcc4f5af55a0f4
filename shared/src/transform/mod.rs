//! Transforms and their execution contract.
//!
//! A [`Transform`] maps one event to zero or more events, or fails. Emitting
//! nothing drops the event; emitting several splits it. Transforms only touch
//! the event they are given, so one instance can serve any number of
//! concurrent callers.
//!
//! Transforms are built from a [`TransformConfig`](crate::config::TransformConfig)
//! by the [`TransformRegistry`], which maps kind names to builders. Built-in
//! kinds:
//!
//! - [`compound`] - an ordered, fail-fast chain of nested steps
//! - [`filter`] - keeps events matching a condition
//! - [`remap`] - sets, renames and removes log fields
//! - [`route`] - tags events with the first matching route name
//! - [`unbatch`] - splits an array field into one log per element
//! - [`log_to_metric`] - turns logs into counters

pub mod chain;
pub mod compound;
pub mod condition;
pub mod filter;
pub mod log_to_metric;
pub mod registry;
pub mod remap;
pub mod route;
pub mod unbatch;

pub use chain::Chain;
pub use compound::Compound;
pub use condition::Condition;
pub use registry::TransformRegistry;

use crate::event::{DataType, DataTypeSet, Event};
use thiserror::Error;

/// Errors raised while processing a single event.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A required field is absent.
    #[error("Field '{field}' is missing from {data_type} event")]
    MissingField {
        /// The field path.
        field: String,
        /// Datatype of the offending event.
        data_type: DataType,
    },

    /// A field holds a value of the wrong type.
    #[error("Field '{field}' on {data_type} event is {found}, expected {expected}")]
    InvalidField {
        /// The field path.
        field: String,
        /// The expected value type.
        expected: &'static str,
        /// The value type found.
        found: &'static str,
        /// Datatype of the offending event.
        data_type: DataType,
    },

    /// The transform was handed an event it cannot process.
    #[error("{kind} does not accept {data_type} events")]
    UnsupportedDataType {
        /// The transform kind.
        kind: String,
        /// Datatype of the offending event.
        data_type: DataType,
    },

    /// The transform emitted a datatype it did not declare.
    #[error("{kind} emitted a {found} event but declares {declared} output")]
    DatatypeChanged {
        /// The transform kind.
        kind: String,
        /// The datatype emitted.
        found: DataType,
        /// The declared output datatypes.
        declared: DataTypeSet,
    },

    /// A step inside a chain failed.
    #[error("Step {index} ({kind}) failed: {source}")]
    Step {
        /// Index of the failing step.
        index: usize,
        /// Kind of the failing step.
        kind: String,
        /// The underlying error.
        #[source]
        source: Box<TransformError>,
    },
}

impl TransformError {
    /// Wraps the error with the chain position it occurred at.
    #[must_use]
    pub fn at_step(self, index: usize, kind: &str) -> Self {
        Self::Step {
            index,
            kind: kind.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the index and kind of the outermost failing step, if tagged.
    #[must_use]
    pub fn step(&self) -> Option<(usize, &str)> {
        match self {
            Self::Step { index, kind, .. } => Some((*index, kind.as_str())),
            _ => None,
        }
    }

    /// Returns the innermost error, below all step tags.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the datatype of the event that failed.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self.root_cause() {
            Self::MissingField { data_type, .. }
            | Self::InvalidField { data_type, .. }
            | Self::UnsupportedDataType { data_type, .. } => *data_type,
            Self::DatatypeChanged { found, .. } => *found,
            Self::Step { source, .. } => source.data_type(),
        }
    }
}

/// The execution contract every transform kind satisfies.
///
/// `process` must not touch state outside the event it is given, and must be
/// CPU-bound: I/O belongs at the pipeline boundary.
pub trait Transform: Send + Sync {
    /// Datatypes this transform accepts.
    fn input(&self) -> DataTypeSet {
        DataTypeSet::ALL
    }

    /// Datatypes this transform may emit.
    fn output(&self) -> DataTypeSet {
        self.input()
    }

    /// Processes one event.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] if the event cannot be processed.
    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError>;
}

/// A built transform together with the kind it was built from.
pub struct Step {
    kind: String,
    transform: Box<dyn Transform>,
}

impl Step {
    /// Creates a step.
    #[must_use]
    pub fn new(kind: impl Into<String>, transform: Box<dyn Transform>) -> Self {
        Self {
            kind: kind.into(),
            transform,
        }
    }

    /// The configured kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The built transform.
    #[must_use]
    pub fn transform(&self) -> &dyn Transform {
        self.transform.as_ref()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("kind", &self.kind)
            .field("input", &self.transform.input())
            .field("output", &self.transform.output())
            .finish()
    }
}
