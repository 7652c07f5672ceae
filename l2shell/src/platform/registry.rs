//! Global dialect registry for looking up dialects by name.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::dialect::Dialect;
use super::vendors;
use crate::error::{ConfigError, Result};

/// Global dialect registry.
static REGISTRY: Lazy<RwLock<DialectRegistry>> = Lazy::new(|| {
    let mut registry = DialectRegistry::new();
    registry.register_builtin_dialects();
    RwLock::new(registry)
});

/// Registry for dialects.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    dialects: HashMap<String, Dialect>,
}

impl DialectRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<DialectRegistry> {
        &REGISTRY
    }

    fn register_builtin_dialects(&mut self) {
        for dialect in [
            vendors::brocade::vdx(),
            vendors::brocade::netiron(),
            vendors::dell::force10(),
            vendors::hp::flex10(),
        ] {
            self.dialects.insert(dialect.name.clone(), dialect);
        }
    }

    /// Register a dialect.
    pub fn register(&mut self, dialect: Dialect) -> Result<()> {
        if self.dialects.contains_key(&dialect.name) {
            return Err(ConfigError::DialectExists {
                name: dialect.name.clone(),
            }
            .into());
        }
        self.dialects.insert(dialect.name.clone(), dialect);
        Ok(())
    }

    /// Get a dialect by name.
    pub fn get(&self, name: &str) -> Option<&Dialect> {
        self.dialects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialects.contains_key(name)
    }

    /// List all registered dialect names.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.dialects.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dialects_registered() {
        let registry = DialectRegistry::global().read().unwrap();
        for name in ["brocade_vdx", "brocade_netiron", "dell_force10", "hp_flex10"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = DialectRegistry::new();
        registry.register(vendors::hp::flex10()).unwrap();
        assert!(registry.register(vendors::hp::flex10()).is_err());
        assert_eq!(registry.names().count(), 1);
    }
}
