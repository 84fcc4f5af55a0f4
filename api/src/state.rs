//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::Config;
use shared::config::ConfigError;
use shared::pipeline::Engine;
use shared::transform::TransformRegistry;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the pipeline engine and the server configuration. Cloning is cheap
/// and every clone drives the same engine.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The pipeline engine.
    engine: Arc<Engine>,
    /// The server configuration.
    config: Arc<Config>,
}

impl AppState {
    /// Creates a new application state around an engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>, config: Config) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    /// Builds the engine from the pipeline the configuration points at.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pipeline cannot be loaded or built.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let pipeline = config.load_pipeline()?;
        let engine = Engine::from_config(&pipeline, Arc::new(TransformRegistry::default()))?;
        Ok(Self::new(Arc::new(engine), config))
    }

    /// Returns a reference to the engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Re-reads the pipeline configuration and swaps the new pipeline in.
    ///
    /// Returns the new pipeline version.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pipeline cannot be loaded or built.
    /// The running pipeline is left untouched in that case.
    pub fn reload(&self) -> Result<u64, ConfigError> {
        let pipeline = self.config.load_pipeline()?;
        self.engine.reload(&pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_from_default_config() {
        let state = AppState::from_config(Config::default()).unwrap();

        assert_eq!(state.engine().version(), 1);
        assert_eq!(state.engine().snapshot().sinks().len(), 1);
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::from_config(Config::default()).unwrap();
        let state2 = state.clone();

        state.reload().unwrap();

        assert_eq!(state2.engine().version(), 2);
    }
}
