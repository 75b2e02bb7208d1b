//! Backend registry for startup-time backend selection.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::PersistenceBackend;
use crate::local::LocalBackend;
use crate::memory::MemoryBackend;
use cryptkeep_common::{Error, Result};

/// Factory function type for creating backends.
pub type BackendFactory = Box<dyn Fn(Value) -> Result<Arc<dyn PersistenceBackend>> + Send + Sync>;

/// Registry mapping backend names to factories.
///
/// The host selects exactly one backend at startup; nothing above this
/// crate ever branches on the storage medium.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// - Returns error if the name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::Storage(format!(
                "Backend '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a backend by name and configuration.
    ///
    /// # Errors
    /// - Backend not registered
    /// - Configuration invalid for the backend
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn PersistenceBackend>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Backend '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered backend names.
    pub fn backends(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in backends registered.
///
/// - `memory`: no configuration
/// - `local`: `{"root": "<directory>"}`
pub fn create_default_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    registry
        .register(
            "memory",
            Box::new(|_config| Ok(Arc::new(MemoryBackend::new()) as Arc<dyn PersistenceBackend>)),
        )
        .expect("fresh registry has no duplicate names");

    registry
        .register(
            "local",
            Box::new(|config| {
                let root = config
                    .get("root")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::Storage("Local backend requires a 'root' path".to_string())
                    })?;
                Ok(Arc::new(LocalBackend::new(root)?) as Arc<dyn PersistenceBackend>)
            }),
        )
        .expect("fresh registry has no duplicate names");

    registry
}
