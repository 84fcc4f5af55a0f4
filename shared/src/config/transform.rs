//! Transform step configuration.

use super::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One transform step: a kind plus its kind-specific options.
///
/// Options are kept opaque until the step is built, when the kind's builder
/// parses them into its own typed options with [`TransformConfig::parse_options`].
///
/// # Example
///
/// ```
/// use shared::config::TransformConfig;
///
/// let config: TransformConfig =
///     serde_json::from_str(r#"{"kind": "unbatch", "field": "items"}"#).unwrap();
///
/// assert_eq!(config.kind, "unbatch");
/// assert_eq!(config.options["field"], "items");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// The transform kind, resolved against the registry.
    pub kind: String,

    /// Kind-specific options.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl TransformConfig {
    /// Creates a step with no options.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: serde_json::Map::new(),
        }
    }

    /// Sets an option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Parses and validates the options as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOptions`] if the options do not
    /// deserialize into `T` or fail its validation rules.
    pub fn parse_options<T>(&self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Validate,
    {
        let invalid = |reason: String| ConfigError::InvalidOptions {
            kind: self.kind.clone(),
            reason,
        };

        let options: T = serde_json::from_value(serde_json::Value::Object(self.options.clone()))
            .map_err(|e| invalid(e.to_string()))?;
        options.validate().map_err(|e| invalid(e.to_string()))?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    #[serde(deny_unknown_fields)]
    struct Options {
        #[validate(length(min = 1))]
        field: String,
    }

    #[test]
    fn test_parse_options() {
        let config = TransformConfig::new("unbatch").with_option("field", "items");
        let options: Options = config.parse_options().unwrap();
        assert_eq!(options.field, "items");
    }

    #[test]
    fn test_parse_options_schema_violation() {
        let config = TransformConfig::new("unbatch").with_option("feild", "items");
        let result = config.parse_options::<Options>();
        assert!(matches!(result, Err(ConfigError::InvalidOptions { kind, .. }) if kind == "unbatch"));
    }

    #[test]
    fn test_parse_options_validation_failure() {
        let config = TransformConfig::new("unbatch").with_option("field", "");
        assert!(matches!(
            config.parse_options::<Options>(),
            Err(ConfigError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn test_serialize_flattens_options() {
        let config = TransformConfig::new("unbatch").with_option("field", "items");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "unbatch", "field": "items"}));
    }
}
