// src/core/registry.rs

//! Registry mapping workflow keys to factories.
//!
//! Plugins register a factory under a stable key; analysis configurations
//! refer to workflows by that key only. Construction of the workflow value
//! happens per request, so registered factories must be cheap to call.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::errors::ConfigError;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

pub struct WorkflowRegistry<T> {
    factories: RwLock<HashMap<String, Factory<T>>>,
}

impl<T> WorkflowRegistry<T> {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `factory` under `key`, replacing any earlier registration.
    pub fn register(&self, key: impl Into<String>, factory: impl Fn() -> T + Send + Sync + 'static) {
        self.factories
            .write()
            .expect("registry lock poisoned")
            .insert(key.into(), Box::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .factories
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Builds a new workflow value for `key`.
    pub fn create(&self, key: &str) -> Result<T, ConfigError> {
        let factories = self.factories.read().expect("registry lock poisoned");
        match factories.get(key) {
            Some(factory) => Ok(factory()),
            None => Err(ConfigError::UnknownRegistryKey {
                key: key.to_string(),
            }),
        }
    }
}

impl<T> std::fmt::Debug for WorkflowRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl<T> Default for WorkflowRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_fresh_values_per_request() {
        let registry: WorkflowRegistry<Vec<String>> = WorkflowRegistry::new();
        registry.register("alignment", || vec!["bwa".to_string()]);

        let a = registry.create("alignment").unwrap();
        let b = registry.create("alignment").unwrap();
        assert_eq!(a, b);
        assert!(registry.contains("alignment"));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry: WorkflowRegistry<u32> = WorkflowRegistry::new();
        assert!(matches!(
            registry.create("missing"),
            Err(ConfigError::UnknownRegistryKey { .. })
        ));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry: WorkflowRegistry<u32> = WorkflowRegistry::new();
        registry.register("w", || 1);
        registry.register("w", || 2);
        assert_eq!(registry.create("w").unwrap(), 2);
        assert_eq!(registry.keys(), vec!["w".to_string()]);
    }
}
