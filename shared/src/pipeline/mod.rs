//! Immutable pipeline snapshots and the engine that runs them.
//!
//! A [`Pipeline`] is built once from a [`PipelineConfig`] and never changes.
//! The [`Engine`] holds the current snapshot behind an atomic pointer;
//! reloading builds a new snapshot and swaps it in, while events already in
//! flight finish on the snapshot they started with.

pub mod engine;

pub use engine::{DeliveryReport, Engine, IngestReport, ProcessReport, SinkDelivery};

use crate::config::{ConfigError, PipelineConfig};
use crate::event::Event;
use crate::sink::{self, RegisteredSink};
use crate::transform::{Chain, TransformError, TransformRegistry};

/// One built version of the pipeline: a transform chain and its sinks.
#[derive(Debug)]
pub struct Pipeline {
    version: u64,
    chain: Chain,
    sinks: Vec<RegisteredSink>,
}

impl Pipeline {
    /// Builds version 1 of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any transform or sink fails to build, or
    /// if adjacent top-level steps cannot exchange any datatype.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::config::PipelineConfig;
    /// use shared::pipeline::Pipeline;
    /// use shared::transform::TransformRegistry;
    ///
    /// let pipeline =
    ///     Pipeline::build(&PipelineConfig::passthrough(), &TransformRegistry::default()).unwrap();
    /// assert_eq!(pipeline.version(), 1);
    /// assert!(pipeline.chain().is_empty());
    /// ```
    pub fn build(config: &PipelineConfig, registry: &TransformRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            version: 1,
            chain: build_chain(config, registry)?,
            sinks: sink::build_all(&config.sinks)?,
        })
    }

    /// Assembles version 1 of a pipeline from already built parts.
    #[must_use]
    pub fn from_parts(chain: Chain, sinks: Vec<RegisteredSink>) -> Self {
        Self {
            version: 1,
            chain,
            sinks,
        }
    }

    /// Builds the successor of this snapshot.
    ///
    /// Sinks whose definition is unchanged are carried over as-is, so their
    /// clients and recordings survive.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] under the same conditions as [`Pipeline::build`].
    pub fn rebuild(
        &self,
        config: &PipelineConfig,
        registry: &TransformRegistry,
    ) -> Result<Self, ConfigError> {
        let chain = build_chain(config, registry)?;
        let fresh = sink::build_all(&config.sinks)?;
        let sinks = fresh
            .into_iter()
            .map(|built| {
                self.sinks
                    .iter()
                    .find(|existing| existing.config() == built.config())
                    .cloned()
                    .unwrap_or(built)
            })
            .collect();

        Ok(Self {
            version: self.version + 1,
            chain,
            sinks,
        })
    }

    /// The snapshot version, starting at 1 and increasing on every reload.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// The top-level transform chain.
    #[must_use]
    pub const fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The sinks terminal events are delivered to.
    #[must_use]
    pub fn sinks(&self) -> &[RegisteredSink] {
        &self.sinks
    }

    /// Looks up a sink by name.
    #[must_use]
    pub fn sink(&self, name: &str) -> Option<&RegisteredSink> {
        self.sinks.iter().find(|sink| sink.name() == name)
    }

    /// Runs one event through the chain.
    ///
    /// # Errors
    ///
    /// Returns the first step error, tagged with the step's index and kind.
    pub fn run(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        self.chain.run(event)
    }
}

fn build_chain(config: &PipelineConfig, registry: &TransformRegistry) -> Result<Chain, ConfigError> {
    let chain = registry.build_chain(&config.transforms)?;
    chain.check_types()?;
    Ok(chain)
}
