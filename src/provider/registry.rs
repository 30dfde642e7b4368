use std::collections::HashMap;

use super::{Provider, SampleCountProvider};

/// Builds a fresh, unconfigured provider instance.
pub type ProviderFactory = fn() -> Box<dyn Provider>;

/// Providers known to this binary, keyed by the name used in configuration.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the providers bundled in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SampleCountProvider::NAME, || {
            Box::new(SampleCountProvider::default())
        });
        registry
    }

    /// Register a factory. Replaces any factory already bound to `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) {
        let name = name.into();
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::warn!(provider = %name, "Replaced registered provider factory");
        }
    }

    pub fn resolve(&self, name: &str) -> Result<ProviderFactory, RegistryError> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_sample_count() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["sample-count"]);
        assert!(registry.resolve("sample-count").is_ok());
    }

    #[test]
    fn test_unknown_provider_fails_to_resolve() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry.resolve("tfr").err().unwrap();
        assert_eq!(err.to_string(), "Unknown provider: tfr");
    }
}
