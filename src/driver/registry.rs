//! Registry mapping driver names to factories.

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use super::DriverFactory;
use super::ssh::SshFactory;
use crate::error::RegistryError;

/// Registry of named driver factories.
///
/// Built mutably at startup, then typically frozen inside an `Arc` and
/// shared with the broker. Resolution clones the factory `Arc`, so a
/// broker operation resolves once and reuses the factory for every device
/// in the batch.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: IndexMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Creates a registry with the built-in drivers registered (currently
    /// just `"ssh"`).
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        // Registering into an empty registry cannot collide.
        let _ = registry.register(super::DEFAULT_DRIVER, SshFactory);
        registry
    }

    /// Registers a factory under a name. Duplicate names are rejected so a
    /// plugin cannot silently shadow another.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: DriverFactory + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        debug!("registered driver '{name}'");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Resolves a driver name to its factory.
    ///
    /// The failure message names every registered driver, since "which
    /// names exist" is the first question a misconfigured inventory raises.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DriverFactory>, RegistryError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDriver {
                name: name.to_string(),
                registered: self.names(),
            })
    }

    /// True when a factory is registered under the name.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered driver names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True when no drivers are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
