//! Interface registry for lookup by name.

use crate::trait_::Interface;
use indexmap::IndexMap;
use std::sync::Arc;

/// Error from registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Interface already registered
    #[error("interface already registered: {name}")]
    AlreadyRegistered { name: String },
    /// Interface not found
    #[error("interface not found: {name}")]
    NotFound { name: String },
}

/// Registry of interfaces by name, in registration order
#[derive(Clone, Default)]
pub struct Registry {
    interfaces: IndexMap<String, Arc<dyn Interface>>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface
    ///
    /// # Errors
    ///
    /// Returns error if an interface with the same name exists
    pub fn register(&mut self, interface: Arc<dyn Interface>) -> Result<(), RegistryError> {
        let name = interface.name().to_string();
        if self.interfaces.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        tracing::debug!(interface = %name, "registered interface");
        self.interfaces.insert(name, interface);
        Ok(())
    }

    /// Get an interface by name
    ///
    /// # Errors
    ///
    /// Returns error if not registered
    pub fn get(&self, name: &str) -> Result<Arc<dyn Interface>, RegistryError> {
        self.interfaces
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Registered names in registration order
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.interfaces.keys().map(String::as_str).collect()
    }

    /// Iterate interfaces
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Interface>> {
        self.interfaces.values()
    }

    /// Check if an interface is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Number of registered interfaces
    #[must_use]
    pub fn count(&self) -> usize {
        self.interfaces.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
