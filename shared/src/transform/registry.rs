//! Registry mapping transform kinds to builders.

use super::{
    compound, filter, log_to_metric, remap, route, unbatch, Chain, Step, Transform,
};
use crate::config::{ConfigError, TransformConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a transform from its configuration.
///
/// The registry is passed along so kinds that nest other steps can build them.
pub type BuildFn = dyn Fn(&TransformConfig, &TransformRegistry) -> Result<Box<dyn Transform>, ConfigError>
    + Send
    + Sync;

/// Resolves transform kinds to builders.
///
/// # Example
///
/// ```
/// use shared::config::TransformConfig;
/// use shared::transform::TransformRegistry;
///
/// let registry = TransformRegistry::with_builtins();
/// let step = registry
///     .build(&TransformConfig::new("unbatch").with_option("field", "items"))
///     .unwrap();
///
/// assert_eq!(step.kind(), "unbatch");
/// assert!(registry.build(&TransformConfig::new("nope")).is_err());
/// ```
#[derive(Clone)]
pub struct TransformRegistry {
    builders: HashMap<String, Arc<BuildFn>>,
}

impl TransformRegistry {
    /// Creates a registry with no kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Creates a registry holding every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register(compound::KIND, compound::build)
            .register(filter::KIND, filter::build)
            .register(remap::KIND, remap::build)
            .register(route::KIND, route::build)
            .register(unbatch::KIND, unbatch::build)
            .register(log_to_metric::KIND, log_to_metric::build);
        registry
    }

    /// Registers a builder, replacing any previous builder for the kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, builder: F) -> &mut Self
    where
        F: Fn(&TransformConfig, &Self) -> Result<Box<dyn Transform>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind.into(), Arc::new(builder));
        self
    }

    /// Returns true if the kind is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Builds one step.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKind`] if the kind is not registered, or
    /// the builder's error if the options are invalid.
    pub fn build(&self, config: &TransformConfig) -> Result<Step, ConfigError> {
        let builder = self
            .builders
            .get(&config.kind)
            .ok_or_else(|| ConfigError::UnknownKind(config.kind.clone()))?;
        let transform = builder(config, self)?;
        Ok(Step::new(config.kind.clone(), transform))
    }

    /// Builds an ordered list of steps.
    ///
    /// Types between adjacent steps are not checked here; see
    /// [`Chain::check_types`].
    ///
    /// # Errors
    ///
    /// Returns the first build error, tagged with the step's index and kind.
    pub fn build_chain(&self, configs: &[TransformConfig]) -> Result<Chain, ConfigError> {
        configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                self.build(config)
                    .map_err(|error| error.at_step(index, &config.kind))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Chain::new)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_util::DropAll;

    #[test]
    fn test_builtin_kinds() {
        let registry = TransformRegistry::with_builtins();
        assert_eq!(
            registry.kinds(),
            vec!["compound", "filter", "log_to_metric", "remap", "route", "unbatch"]
        );
    }

    #[test]
    fn test_unknown_kind() {
        let registry = TransformRegistry::with_builtins();
        let result = registry.build(&TransformConfig::new("dedupe"));
        assert!(matches!(result, Err(ConfigError::UnknownKind(kind)) if kind == "dedupe"));
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = TransformRegistry::empty();
        registry.register("drop_all", |_, _| Ok(Box::new(DropAll)));

        assert!(registry.contains("drop_all"));
        let step = registry.build(&TransformConfig::new("drop_all")).unwrap();
        assert_eq!(step.kind(), "drop_all");
    }

    #[test]
    fn test_build_chain_tags_failing_step() {
        let registry = TransformRegistry::with_builtins();
        let configs = vec![
            TransformConfig::new("unbatch").with_option("field", "items"),
            TransformConfig::new("unbatch"),
        ];

        let error = registry.build_chain(&configs).unwrap_err();

        match error {
            ConfigError::Step { index, kind, source } => {
                assert_eq!(index, 1);
                assert_eq!(kind, "unbatch");
                assert!(matches!(*source, ConfigError::InvalidOptions { .. }));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
