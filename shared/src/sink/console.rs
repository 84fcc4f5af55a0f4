//! Console sink.

use super::{DeliveryStatus, Sink};
use crate::codec::{EncodedBatch, CONTENT_TYPE_JSON};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writes each batch to standard output as one line.
///
/// Uncompressed JSON bodies are written as-is. Binary or compressed bodies
/// are summarized instead.
pub struct ConsoleSink {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl ConsoleSink {
    /// Creates a sink writing to standard output.
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    /// Creates a sink writing to an arbitrary writer.
    #[must_use]
    pub fn with_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

fn render(batch: &EncodedBatch) -> Vec<u8> {
    if batch.content_encoding.is_none() && batch.content_type == CONTENT_TYPE_JSON {
        let mut line = batch.body.to_vec();
        line.push(b'\n');
        line
    } else {
        format!(
            "<{} batch: {} events, {} bytes, encoding {}>\n",
            batch.protocol,
            batch.event_count,
            batch.body.len(),
            batch.content_encoding.unwrap_or("identity")
        )
        .into_bytes()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn send(&self, batch: EncodedBatch) -> DeliveryStatus {
        let line = render(&batch);
        let mut out = self.out.lock().await;
        match out.write_all(&line).await {
            Ok(()) => match out.flush().await {
                Ok(()) => DeliveryStatus::Delivered,
                Err(e) => DeliveryStatus::Errored {
                    message: e.to_string(),
                },
            },
            Err(e) => DeliveryStatus::Errored {
                message: e.to_string(),
            },
        }
    }
}
