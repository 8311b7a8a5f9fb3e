//! Schema Resolver / Schema Registry: resolves a structured-output or
//! function-parameter type name to its JSON schema.
//!
//! Named schemas are pre-registered into a lookup table at start-up;
//! `SchemaProvider` is a pure, synchronous lookup, mirroring the resolve-by-name
//! shape of a model-limit resolver.

use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves a named type to its JSON schema (as a literal string).
///
/// Implementations must be side-effect free beyond their own caching.
pub trait SchemaProvider: Send + Sync {
    fn resolve(&self, type_name: &str) -> Option<String>;
}

/// A schema registry populated by the embedding application before scenarios are built.
#[derive(Default)]
pub struct StaticSchemaRegistry {
    schemas: RwLock<HashMap<String, String>>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the schema for a named type.
    pub fn register(&self, type_name: impl Into<String>, json_schema: impl Into<String>) {
        self.schemas
            .write()
            .expect("schema registry lock poisoned")
            .insert(type_name.into(), json_schema.into());
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .expect("schema registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl SchemaProvider for StaticSchemaRegistry {
    fn resolve(&self, type_name: &str) -> Option<String> {
        self.schemas
            .read()
            .expect("schema registry lock poisoned")
            .get(type_name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_type() {
        let reg = StaticSchemaRegistry::new();
        reg.register("Weather", r#"{"type":"object"}"#);
        assert_eq!(reg.resolve("Weather"), Some(r#"{"type":"object"}"#.to_string()));
    }

    #[test]
    fn unregistered_type_resolves_to_none() {
        let reg = StaticSchemaRegistry::new();
        assert_eq!(reg.resolve("Missing"), None);
    }

    #[test]
    fn register_replaces_existing_entry() {
        let reg = StaticSchemaRegistry::new();
        reg.register("X", "a");
        reg.register("X", "b");
        assert_eq!(reg.resolve("X"), Some("b".to_string()));
    }

    #[test]
    fn registered_names_sorted() {
        let reg = StaticSchemaRegistry::new();
        reg.register("b", "1");
        reg.register("a", "2");
        assert_eq!(reg.registered_names(), vec!["a".to_string(), "b".to_string()]);
    }
}
