//! Sinks deliver encoded batches to their destination.
//!
//! A [`Sink`] only moves bytes. Selecting which events a sink receives and
//! encoding them for its protocol is done by [`RegisteredSink`], which pairs a
//! sink with its [`SinkConfig`]. The pipeline engine holds one registered sink
//! per configured destination.

pub mod console;
pub mod http;
pub mod memory;

pub use console::ConsoleSink;
pub use http::HttpSink;
pub use memory::MemorySink;

use crate::codec::{self, DecodeError, EncodeError, EncodedBatch};
use crate::config::{ConfigError, SinkConfig, SinkKind};
use crate::event::{DataType, DataTypeSet, Event};
use crate::telemetry;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

/// Outcome of delivering a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Every event was accepted by the destination.
    Delivered,
    /// Some events were refused.
    Partial {
        /// Number of refused events.
        rejected: usize,
        /// Why they were refused.
        message: String,
    },
    /// The destination refused the batch. Retrying will not help.
    Rejected {
        /// Why it was refused.
        message: String,
    },
    /// Delivery failed. The batch may be retried.
    Errored {
        /// What went wrong.
        message: String,
    },
}

impl DeliveryStatus {
    /// Returns `true` if every event was delivered.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Folds the statuses of several deliveries into one.
    ///
    /// Any errored delivery makes the whole errored. Otherwise refusals are
    /// summed: if nothing was delivered at all the result is rejected, else
    /// partial. No deliveries at all count as delivered.
    #[must_use]
    pub fn combine<'a>(deliveries: impl IntoIterator<Item = (&'a Self, usize)>) -> Self {
        let mut rejected = 0;
        let mut delivered = 0;
        let mut messages = Vec::new();

        for (status, events) in deliveries {
            match status {
                Self::Delivered => delivered += events,
                Self::Partial {
                    rejected: count,
                    message,
                } => {
                    rejected += count;
                    delivered += events.saturating_sub(*count);
                    messages.push(message.clone());
                }
                Self::Rejected { message } => {
                    rejected += events;
                    messages.push(message.clone());
                }
                Self::Errored { message } => {
                    return Self::Errored {
                        message: message.clone(),
                    }
                }
            }
        }

        match (rejected, delivered) {
            (0, _) => Self::Delivered,
            (_, 0) => Self::Rejected {
                message: messages.join("; "),
            },
            _ => Self::Partial {
                rejected,
                message: messages.join("; "),
            },
        }
    }
}

/// Errors raised when handing events to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink does not accept this datatype.
    #[error("Sink '{sink}' does not accept {data_type} events")]
    IncompatibleDataType {
        /// The sink name.
        sink: String,
        /// The refused datatype.
        data_type: DataType,
    },

    /// No sink has this name.
    #[error("Unknown sink '{0}'")]
    UnknownSink(String),

    /// The events could not be encoded for the sink's protocol.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A recorded batch could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A sink's internal lock was poisoned.
    #[error("Failed to acquire lock on sink")]
    LockError,
}

/// A destination for encoded batches.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sends one batch and reports how the destination took it.
    async fn send(&self, batch: EncodedBatch) -> DeliveryStatus;
}

/// A sink together with the configuration selecting and encoding its events.
#[derive(Clone)]
pub struct RegisteredSink {
    config: SinkConfig,
    accepts: DataTypeSet,
    sink: Arc<dyn Sink>,
}

impl RegisteredSink {
    /// Pairs a sink with its configuration.
    #[must_use]
    pub fn new(config: SinkConfig, sink: Arc<dyn Sink>) -> Self {
        let accepts = config.accepts();
        Self {
            config,
            accepts,
            sink,
        }
    }

    /// The sink name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The sink configuration.
    #[must_use]
    pub const fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Datatypes this sink accepts.
    #[must_use]
    pub const fn accepts(&self) -> DataTypeSet {
        self.accepts
    }

    /// Returns `true` if the event should be delivered to this sink.
    ///
    /// The event's datatype must be accepted and, when the sink selects a
    /// route, the event must carry it.
    #[must_use]
    pub fn selects(&self, event: &Event) -> bool {
        self.accepts.contains(event.data_type())
            && self
                .config
                .route
                .as_ref()
                .is_none_or(|route| event.metadata().route.as_ref() == Some(route))
    }

    /// Encodes events for this sink's protocol and sends them.
    ///
    /// Events the protocol cannot carry in one payload, such as traces from
    /// several hosts, go out as one batch per group and the statuses are
    /// combined.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::IncompatibleDataType`] if any event's datatype is
    /// not accepted, or [`SinkError::Encode`] if encoding fails. Nothing is
    /// sent in either case.
    pub async fn deliver(&self, events: &[Event]) -> Result<DeliveryStatus, SinkError> {
        if let Some(event) = events
            .iter()
            .find(|event| !self.accepts.contains(event.data_type()))
        {
            return Err(SinkError::IncompatibleDataType {
                sink: self.config.name.clone(),
                data_type: event.data_type(),
            });
        }

        let batches = codec::split_batch(events, self.config.protocol)
            .iter()
            .map(|batch| codec::encode(batch, self.config.protocol, self.config.compression))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sent = Vec::with_capacity(batches.len());
        for batch in batches {
            let count = batch.event_count;
            sent.push((self.sink.send(batch).await, count));
        }
        let status = match sent.as_slice() {
            [(status, _)] => status.clone(),
            _ => DeliveryStatus::combine(sent.iter().map(|(status, count)| (status, *count))),
        };

        if !status.is_delivered() {
            telemetry::delivery_failed(&self.config.name);
            tracing::warn!(
                sink = %self.config.name,
                events = events.len(),
                status = ?status,
                "Delivery did not complete"
            );
        }
        Ok(status)
    }
}

impl std::fmt::Debug for RegisteredSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSink")
            .field("config", &self.config)
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

/// Builds the sink described by a configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSink`] if the definition fails validation,
/// accepts no datatype, or names an unusable endpoint.
pub fn build(config: &SinkConfig) -> Result<RegisteredSink, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSink {
        name: config.name.clone(),
        reason,
    };

    config.validate().map_err(|e| invalid(e.to_string()))?;
    if config.accepts().is_empty() {
        return Err(invalid(format!(
            "protocol {} carries none of the selected datatypes",
            config.protocol
        )));
    }

    let sink: Arc<dyn Sink> = match &config.kind {
        SinkKind::Console => Arc::new(ConsoleSink::new()),
        SinkKind::Memory => Arc::new(MemorySink::new()),
        SinkKind::Http {
            endpoint,
            headers,
            timeout_secs,
        } => Arc::new(
            HttpSink::new(endpoint, headers.clone(), *timeout_secs).map_err(invalid)?,
        ),
    };

    Ok(RegisteredSink::new(config.clone(), sink))
}

/// Builds every configured sink.
///
/// # Errors
///
/// Returns [`ConfigError::DuplicateSink`] if two sinks share a name, or the
/// first error from [`build`].
pub fn build_all(configs: &[SinkConfig]) -> Result<Vec<RegisteredSink>, ConfigError> {
    let mut names = HashSet::new();
    configs
        .iter()
        .map(|config| {
            if !names.insert(config.name.as_str()) {
                return Err(ConfigError::DuplicateSink(config.name.clone()));
            }
            build(config)
        })
        .collect()
}
