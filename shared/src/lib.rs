//! Telepipe Shared Library
//!
//! The core of the Telepipe pipeline node: a typed event model for logs,
//! metrics and traces, wire codecs, the transform execution contract and the
//! engine that runs configured transform chains and delivers the results.
//!
//! # Modules
//!
//! - [`event`] - Events and their values
//! - [`codec`] - Payload decoding and batch encoding
//! - [`config`] - Pipeline configuration
//! - [`transform`] - The transform contract, built-in kinds and the registry
//! - [`pipeline`] - Pipeline snapshots and the engine
//! - [`sink`] - Delivery destinations
//! - [`telemetry`] - Internal counters
//!
//! # Example
//!
//! ```
//! use shared::config::{PipelineConfig, TransformConfig};
//! use shared::event::{LogEvent, Value};
//! use shared::pipeline::Engine;
//! use shared::transform::TransformRegistry;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::default().with_transform(
//!     TransformConfig::new("unbatch").with_option("field", "items"),
//! );
//! let engine = Engine::from_config(&config, Arc::new(TransformRegistry::default())).unwrap();
//!
//! let log = LogEvent::new().with_field("items", vec![Value::from("a"), Value::from("b")]);
//! let output = engine.run(log.into()).unwrap();
//!
//! assert_eq!(output.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod config;
pub mod event;
pub mod pipeline;
pub mod sink;
pub mod telemetry;
pub mod transform;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
