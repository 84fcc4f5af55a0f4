//! The pipeline engine.
//!
//! The engine owns the current [`Pipeline`] snapshot behind an [`ArcSwap`].
//! Every operation loads the snapshot once and uses it to the end, so an
//! event never sees stages from two pipeline versions. [`Engine::reload`]
//! builds the next snapshot off to the side and swaps it in atomically; the
//! old one is dropped when its last in-flight user lets go.

use super::Pipeline;
use crate::codec::{self, DecodeError, Payload};
use crate::config::{ConfigError, PipelineConfig};
use crate::event::Event;
use crate::sink::{DeliveryStatus, SinkError};
use crate::telemetry;
use crate::transform::{TransformError, TransformRegistry};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of running a batch of independent events through the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    /// Events that entered the chain.
    pub accepted: usize,
    /// Terminal events, in input order then emission order.
    pub emitted: Vec<Event>,
    /// Input events whose traversal emitted nothing.
    pub dropped: usize,
    /// Input events whose traversal failed. They were discarded.
    pub errored: usize,
}

/// Delivery of one batch to one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkDelivery {
    /// The sink name.
    pub sink: String,
    /// Number of events in the batch.
    pub events: usize,
    /// How the sink took it.
    pub status: DeliveryStatus,
}

/// Outcome of dispatching terminal events to the sinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// One entry per sink that was handed a batch.
    pub deliveries: Vec<SinkDelivery>,
    /// Events no sink selected.
    pub unrouted: usize,
}

impl DeliveryReport {
    /// The combined status of every delivery.
    #[must_use]
    pub fn status(&self) -> DeliveryStatus {
        DeliveryStatus::combine(
            self.deliveries
                .iter()
                .map(|delivery| (&delivery.status, delivery.events)),
        )
    }
}

/// Outcome of ingesting one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Events decoded from the payload.
    pub accepted: usize,
    /// Terminal events handed to the sinks.
    pub emitted: usize,
    /// Decoded events whose traversal emitted nothing.
    pub dropped: usize,
    /// Decoded events discarded after a transform error.
    pub errored: usize,
    /// Pipeline version the payload was processed with.
    pub version: u64,
    /// Per-sink delivery outcome.
    pub delivery: DeliveryReport,
}

/// Runs events through the current pipeline and delivers the results.
pub struct Engine {
    current: ArcSwap<Pipeline>,
    registry: Arc<TransformRegistry>,
}

impl Engine {
    /// Creates an engine serving a built pipeline.
    #[must_use]
    pub fn new(pipeline: Pipeline, registry: Arc<TransformRegistry>) -> Self {
        Self {
            current: ArcSwap::from_pointee(pipeline),
            registry,
        }
    }

    /// Builds the pipeline described by `config` and serves it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pipeline fails to build.
    pub fn from_config(
        config: &PipelineConfig,
        registry: Arc<TransformRegistry>,
    ) -> Result<Self, ConfigError> {
        let pipeline = Pipeline::build(config, &registry)?;
        Ok(Self::new(pipeline, registry))
    }

    /// The pipeline snapshot new work starts on.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Pipeline> {
        self.current.load_full()
    }

    /// The version of the current snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// The registry reloads are built with.
    #[must_use]
    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Runs one event through the current chain.
    ///
    /// # Errors
    ///
    /// Returns the tagged [`TransformError`] of the failing step. The event is
    /// not counted as discarded; that is left to the caller.
    pub fn run(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        self.current.load().run(event)
    }

    /// Runs independent events through the current chain.
    ///
    /// A failing event is logged, counted and discarded; the rest of the batch
    /// carries on.
    #[must_use]
    pub fn process(&self, events: Vec<Event>) -> ProcessReport {
        process_with(&self.current.load(), events)
    }

    /// Delivers terminal events to every sink that selects them.
    pub async fn dispatch(&self, events: &[Event]) -> DeliveryReport {
        let pipeline = self.snapshot();
        dispatch_with(&pipeline, events).await
    }

    /// Delivers events to one named sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnknownSink`] if no sink has this name,
    /// [`SinkError::IncompatibleDataType`] if the sink does not accept one of
    /// the events, or [`SinkError::Encode`] if encoding fails.
    pub async fn deliver_to(
        &self,
        sink: &str,
        events: &[Event],
    ) -> Result<DeliveryStatus, SinkError> {
        let pipeline = self.snapshot();
        let sink = pipeline
            .sink(sink)
            .ok_or_else(|| SinkError::UnknownSink(sink.to_string()))?;
        sink.deliver(events).await
    }

    /// Decodes a payload, runs its events and delivers the results.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the payload does not decode. No event
    /// enters the chain in that case.
    pub async fn ingest(&self, payload: &Payload) -> Result<IngestReport, DecodeError> {
        let events = codec::decode(payload)?;
        let pipeline = self.snapshot();

        let report = process_with(&pipeline, events);
        let delivery = dispatch_with(&pipeline, &report.emitted).await;

        tracing::debug!(
            data_type = %payload.data_type,
            accepted = report.accepted,
            emitted = report.emitted.len(),
            dropped = report.dropped,
            errored = report.errored,
            version = pipeline.version(),
            "Payload processed"
        );

        Ok(IngestReport {
            accepted: report.accepted,
            emitted: report.emitted.len(),
            dropped: report.dropped,
            errored: report.errored,
            version: pipeline.version(),
            delivery,
        })
    }

    /// Builds a pipeline from `config` and swaps it in.
    ///
    /// Work already running keeps the snapshot it started with. On error the
    /// current pipeline stays in place.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the new pipeline fails to build.
    pub fn reload(&self, config: &PipelineConfig) -> Result<u64, ConfigError> {
        loop {
            let current = self.current.load_full();
            let next = Arc::new(current.rebuild(config, &self.registry)?);
            let version = next.version();

            let previous = self.current.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                telemetry::pipeline_reloaded();
                tracing::info!(
                    version,
                    transforms = config.transforms.len(),
                    sinks = config.sinks.len(),
                    "Pipeline reloaded"
                );
                return Ok(version);
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pipeline", &self.current.load())
            .field("registry", &self.registry)
            .finish()
    }
}

fn process_with(pipeline: &Pipeline, events: Vec<Event>) -> ProcessReport {
    let mut report = ProcessReport {
        accepted: events.len(),
        ..ProcessReport::default()
    };

    for event in events {
        let data_type = event.data_type();
        match pipeline.run(event) {
            Ok(output) if output.is_empty() => report.dropped += 1,
            Ok(output) => report.emitted.extend(output),
            Err(error) => {
                report.errored += 1;
                telemetry::events_discarded(data_type, 1);
                tracing::warn!(
                    error = %error,
                    data_type = %data_type,
                    version = pipeline.version(),
                    "Discarded event after transform error"
                );
            }
        }
    }

    report
}

async fn dispatch_with(pipeline: &Pipeline, events: &[Event]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let mut selected_by_any = vec![false; events.len()];

    for sink in pipeline.sinks() {
        let mut batch = Vec::new();
        for (index, event) in events.iter().enumerate() {
            if sink.selects(event) {
                selected_by_any[index] = true;
                batch.push(event.clone());
            }
        }
        if batch.is_empty() {
            continue;
        }

        let status = match sink.deliver(&batch).await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(sink = sink.name(), error = %error, "Batch not delivered");
                DeliveryStatus::Rejected {
                    message: error.to_string(),
                }
            }
        };
        report.deliveries.push(SinkDelivery {
            sink: sink.name().to_string(),
            events: batch.len(),
            status,
        });
    }

    report.unrouted = selected_by_any.iter().filter(|selected| !**selected).count();
    if report.unrouted > 0 {
        tracing::debug!(events = report.unrouted, "Events selected by no sink");
    }
    report
}
