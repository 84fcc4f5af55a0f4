//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{bail, Context, Result};
use shared::config::{ConfigError, PipelineConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `TELEPIPE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `TELEPIPE_PORT`: The port to listen on (default: 8282)
/// - `TELEPIPE_PIPELINE_CONFIG`: Path to the pipeline JSON file (default: a
///   pass-through pipeline with a console sink)
/// - `TELEPIPE_DISABLE_LOGS`, `TELEPIPE_DISABLE_METRICS`,
///   `TELEPIPE_DISABLE_TRACES`: Skip mounting the matching intake routes
/// - `TELEPIPE_ACKNOWLEDGEMENTS`: Wait for sink delivery before answering
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Path to the pipeline configuration file.
    pub pipeline_config: Option<PathBuf>,
    /// Do not accept logs.
    pub disable_logs: bool,
    /// Do not accept metrics.
    pub disable_metrics: bool,
    /// Do not accept traces.
    pub disable_traces: bool,
    /// Map sink delivery failures to HTTP errors.
    pub acknowledgements: bool,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `TELEPIPE_PORT` is set but cannot be parsed as a valid port number
    /// - A boolean flag is set to something other than true/false/1/0/yes/no
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("TELEPIPE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("TELEPIPE_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("TELEPIPE_PORT is not a valid port")?
            .unwrap_or(8282);

        let flag = |name: &str| -> Result<bool> {
            match lookup(name).as_deref().map(str::to_ascii_lowercase).as_deref() {
                None | Some("" | "0" | "false" | "no") => Ok(false),
                Some("1" | "true" | "yes") => Ok(true),
                Some(other) => bail!("{name} must be a boolean, got '{other}'"),
            }
        };

        Ok(Self {
            host,
            port,
            pipeline_config: lookup("TELEPIPE_PIPELINE_CONFIG")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            disable_logs: flag("TELEPIPE_DISABLE_LOGS")?,
            disable_metrics: flag("TELEPIPE_DISABLE_METRICS")?,
            disable_traces: flag("TELEPIPE_DISABLE_TRACES")?,
            acknowledgements: flag("TELEPIPE_ACKNOWLEDGEMENTS")?,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port combination is not a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Loads the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configured file cannot be read or parsed.
    pub fn load_pipeline(&self) -> Result<PipelineConfig, ConfigError> {
        match &self.pipeline_config {
            Some(path) => PipelineConfig::from_file(path),
            None => Ok(PipelineConfig::passthrough()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8282,
            pipeline_config: None,
            disable_logs: false,
            disable_metrics: false,
            disable_traces: false,
            acknowledgements: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8282);
        assert!(config.pipeline_config.is_none());
        assert!(!config.disable_logs);
        assert!(!config.acknowledgements);
    }

    #[test]
    fn test_reads_variables() {
        let config = Config::from_lookup(lookup(&[
            ("TELEPIPE_HOST", "127.0.0.1"),
            ("TELEPIPE_PORT", "9000"),
            ("TELEPIPE_PIPELINE_CONFIG", "/etc/telepipe/pipeline.json"),
            ("TELEPIPE_DISABLE_TRACES", "TRUE"),
            ("TELEPIPE_ACKNOWLEDGEMENTS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(
            config.pipeline_config,
            Some(PathBuf::from("/etc/telepipe/pipeline.json"))
        );
        assert!(config.disable_traces);
        assert!(!config.disable_metrics);
        assert!(config.acknowledgements);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("TELEPIPE_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TELEPIPE_DISABLE_LOGS", "maybe")])).is_err());
    }

    #[test]
    fn test_socket_addr_invalid_host() {
        let config = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_load_pipeline_defaults_to_passthrough() {
        let pipeline = Config::default().load_pipeline().unwrap();
        assert_eq!(pipeline, PipelineConfig::passthrough());
    }

    #[test]
    fn test_load_pipeline_missing_file() {
        let config = Config {
            pipeline_config: Some(PathBuf::from("/nonexistent/pipeline.json")),
            ..Config::default()
        };
        assert!(matches!(
            config.load_pipeline(),
            Err(ConfigError::Io { .. })
        ));
    }
}
