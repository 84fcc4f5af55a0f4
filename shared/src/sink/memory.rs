//! In-memory sink, mainly for tests and the `tap` command.

use super::{DeliveryStatus, Sink, SinkError};
use crate::codec::{self, EncodedBatch};
use crate::event::Event;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Records every batch it is sent.
///
/// Clones share the same recording, so a test can keep one handle while the
/// pipeline owns another.
///
/// # Example
///
/// ```
/// use shared::sink::{DeliveryStatus, MemorySink};
///
/// let sink = MemorySink::new().with_status(DeliveryStatus::Rejected {
///     message: "quota exceeded".to_string(),
/// });
/// assert!(sink.batches().unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    batches: Arc<RwLock<Vec<EncodedBatch>>>,
    status: DeliveryStatus,
}

impl MemorySink {
    /// Creates an empty sink that reports every batch as delivered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: Arc::new(RwLock::new(Vec::new())),
            status: DeliveryStatus::Delivered,
        }
    }

    /// Reports this status for every batch instead of delivered.
    #[must_use]
    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the recorded batches, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::LockError`] if the recording lock is poisoned.
    pub fn batches(&self) -> Result<Vec<EncodedBatch>, SinkError> {
        let batches = self.batches.read().map_err(|_| SinkError::LockError)?;
        Ok(batches.clone())
    }

    /// Decodes every recorded batch and returns the events in delivery order.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::LockError`] if the recording lock is poisoned, or
    /// [`SinkError::Decode`] if a batch cannot be decoded.
    pub fn events(&self) -> Result<Vec<Event>, SinkError> {
        let mut events = Vec::new();
        for batch in self.batches()? {
            events.extend(codec::decode_batch(&batch)?);
        }
        Ok(events)
    }

    /// Forgets every recorded batch.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::LockError`] if the recording lock is poisoned.
    pub fn clear(&self) -> Result<(), SinkError> {
        self.batches
            .write()
            .map_err(|_| SinkError::LockError)?
            .clear();
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&self, batch: EncodedBatch) -> DeliveryStatus {
        match self.batches.write() {
            Ok(mut batches) => {
                batches.push(batch);
                self.status.clone()
            }
            Err(_) => DeliveryStatus::Errored {
                message: SinkError::LockError.to_string(),
            },
        }
    }
}
