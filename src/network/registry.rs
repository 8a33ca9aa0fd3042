//! Processor factories keyed by class identifier.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::kind::BuiltinKind;
use crate::network::processor::AnyProcessor;
use std::collections::HashMap;

type Factory = Box<dyn Fn() -> AnyProcessor>;

#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, Factory>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing every built-in kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for &kind in BuiltinKind::all() {
            registry.register(kind.class_identifier(), move || kind.create());
        }
        registry
    }

    /// Register a factory. Returns `true` if it replaced an existing one.
    pub fn register(
        &mut self,
        class_identifier: impl Into<String>,
        factory: impl Fn() -> AnyProcessor + 'static,
    ) -> bool {
        self.factories
            .insert(class_identifier.into(), Box::new(factory))
            .is_some()
    }

    pub fn contains(&self, class_identifier: &str) -> bool {
        self.factories.contains_key(class_identifier)
    }

    pub fn create(&self, class_identifier: &str) -> NetworkResult<AnyProcessor> {
        self.factories
            .get(class_identifier)
            .map(|factory| factory())
            .ok_or_else(|| NetworkError::UnknownClass(class_identifier.to_string()))
    }

    /// Registered class identifiers, sorted.
    pub fn class_identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("classes", &self.class_identifiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ProcessorRegistry::with_builtins();
        assert_eq!(registry.class_identifiers().len(), BuiltinKind::all().len());
        assert!(registry.create("visflow.Sum").is_ok());
    }

    #[test]
    fn test_unknown_class() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.create("visflow.Missing"),
            Err(NetworkError::UnknownClass(name)) if name == "visflow.Missing"
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProcessorRegistry::with_builtins();
        assert!(registry.register("visflow.Sum", || BuiltinKind::Scale.create()));
        let created = registry.create("visflow.Sum").expect("registered");
        assert_eq!(created.info().class_identifier, "visflow.Scale");
    }
}
