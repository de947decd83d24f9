//! Resource type registry

use reconcile::{Resource, SharedResource};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("resource type '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown resource type '{0}'")]
    Unknown(String),
    #[error("invalid schema for resource type '{resource_type}': {reason}")]
    InvalidSchema { resource_type: String, reason: String },
}

/// Maps resource type names to their implementations
#[derive(Debug, Default, Clone)]
pub struct Registry {
    resources: BTreeMap<&'static str, SharedResource>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type
    ///
    /// The schema is checked once here so a malformed definition fails
    /// at startup rather than on first use.
    pub fn register<R: Resource + 'static>(&mut self, resource: R) -> Result<(), RegistryError> {
        self.register_shared(Arc::new(resource))
    }

    pub fn register_shared(&mut self, resource: SharedResource) -> Result<(), RegistryError> {
        let resource_type = resource.resource_type();
        if self.resources.contains_key(resource_type) {
            return Err(RegistryError::Duplicate(resource_type.to_string()));
        }
        resource
            .schema()
            .check()
            .map_err(|e| RegistryError::InvalidSchema {
                resource_type: resource_type.to_string(),
                reason: e.to_string(),
            })?;

        log::debug!("Registered resource type {resource_type}");
        self.resources.insert(resource_type, resource);
        Ok(())
    }

    pub fn get(&self, resource_type: &str) -> Result<SharedResource, RegistryError> {
        self.resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(resource_type.to_string()))
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.resources.contains_key(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use reconcile::{Attribute, Schema, Type};

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        registry.register(FakeServer::new()).unwrap();

        assert!(registry.contains("fake_server"));
        assert_eq!(registry.get("fake_server").unwrap().resource_type(), "fake_server");
        assert_eq!(registry.resource_types().collect::<Vec<_>>(), vec!["fake_server"]);
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut registry = Registry::new();
        registry.register(FakeServer::new()).unwrap();
        assert_eq!(
            registry.register(FakeServer::new()),
            Err(RegistryError::Duplicate("fake_server".into()))
        );
    }

    #[test]
    fn test_unknown_type() {
        let registry = Registry::new();
        assert_eq!(
            registry.get("nope").unwrap_err().to_string(),
            "unknown resource type 'nope'"
        );
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let schema = Schema::new().attribute(
            "broken",
            Attribute::required(Type::String).with_computed(),
        );
        let mut registry = Registry::new();
        let err = registry.register(FakeServer::with_schema(schema)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }
}
