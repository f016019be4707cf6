//! Provider registry for resolving mirrors by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::local::LocalProvider;
use crate::memory::MemoryProvider;
use crate::provider::StorageProvider;
use passvault_common::{Error, Result};

/// Providers the default registry backs with a local mirror directory.
pub const MIRROR_PROVIDERS: [&str; 4] = ["local", "dropbox", "gdrive", "onedrive"];

/// Factory function type for creating providers.
pub type ProviderFactory = Box<dyn Fn(Value) -> Result<Arc<dyn StorageProvider>> + Send + Sync>;

/// Registry for storage provider factories.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a provider factory.
    ///
    /// # Errors
    /// - `AlreadyExists` if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Provider '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a provider by name and configuration.
    ///
    /// # Errors
    /// - `NotFound` if the provider is not registered
    /// - whatever the factory reports for invalid configuration
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn StorageProvider>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Provider '{}' is not registered", name)))?;
        factory(config)
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn mirror_factory(provider: &'static str) -> ProviderFactory {
    Box::new(move |config: Value| {
        let root = config.get("root").and_then(|v| v.as_str()).ok_or_else(|| {
            Error::InvalidInput(format!("Provider '{}' requires a 'root' path", provider))
        })?;
        Ok(Arc::new(LocalProvider::for_provider(root, provider)?) as Arc<dyn StorageProvider>)
    })
}

/// Create a registry with the built-in providers.
///
/// "memory" takes no configuration. Every name in [`MIRROR_PROVIDERS`]
/// expects `{"root": "<mirror root>"}` and writes to `<mirror root>/<name>`.
pub fn create_default_registry() -> ProviderRegistry {
    let mut factories: HashMap<String, ProviderFactory> = HashMap::new();

    factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(MemoryProvider::new()) as Arc<dyn StorageProvider>)),
    );

    for provider in MIRROR_PROVIDERS {
        factories.insert(provider.to_string(), mirror_factory(provider));
    }

    ProviderRegistry { factories }
}
