//! Builds an execution plan from the desired instance set

use crate::registry::Registry;
use crate::state::resource_type_of;
use anyhow::{Context, Result};
use reconcile::{Attributes, ExecutionPlan, Instance, StateStore};
use std::collections::BTreeSet;

/// One desired resource instance
#[derive(Debug, Clone)]
pub struct Desired {
    pub resource_type: String,
    pub name: String,
    pub config: Attributes,
}

impl Desired {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>, config: Attributes) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            config,
        }
    }

    /// State key of the instance: `type.name`
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Plan every desired instance plus a destroy for each stored orphan
///
/// An orphan is an instance with stored state that is no longer desired.
/// Stored state for a resource type the registry does not know is left
/// alone, since there is no Delete callback to run for it.
pub fn plan_desired(registry: &Registry, store: &dyn StateStore, desired: &[Desired]) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();
    let mut keys = BTreeSet::new();

    for instance in desired {
        let key = instance.key();
        let resource = registry
            .get(&instance.resource_type)
            .with_context(|| format!("Cannot plan {key}"))?;
        if !keys.insert(key.clone()) {
            anyhow::bail!("Instance {key} is declared more than once");
        }
        plan.add(Instance::new(key, resource, instance.config.clone()));
    }

    for key in store.keys().context("Failed to list stored state")? {
        if keys.contains(&key) {
            continue;
        }
        match registry.get(resource_type_of(&key)) {
            Ok(resource) => {
                log::debug!("Planning destroy of orphaned instance {key}");
                plan.add(Instance::orphan(key, resource));
            }
            Err(e) => log::warn!("Skipping stored state {key}: {e}"),
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use reconcile::{MemoryStore, State};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(FakeServer::new()).unwrap();
        registry
    }

    fn web() -> Desired {
        Desired::new("fake_server", "web", Attributes::new().with("name", "web"))
    }

    #[test]
    fn test_desired_key() {
        assert_eq!(web().key(), "fake_server.web");
    }

    #[test]
    fn test_orphans_are_destroyed() {
        let store = MemoryStore::new();
        store
            .save_state("fake_server.old", &State::new("srv-9", Attributes::new()))
            .unwrap();
        store
            .save_state("fake_server.web", &State::new("srv-1", Attributes::new()))
            .unwrap();

        let plan = plan_desired(&registry(), &store, &[web()]).unwrap();
        assert_eq!(plan.keys().collect::<Vec<_>>(), vec!["fake_server.web", "fake_server.old"]);
        assert!(plan.instances[0].config.is_some());
        assert!(plan.instances[1].config.is_none());
    }

    #[test]
    fn test_unknown_stored_type_is_skipped() {
        let store = MemoryStore::new();
        store
            .save_state("gone_type.x", &State::new("x-1", Attributes::new()))
            .unwrap();
        let plan = plan_desired(&registry(), &store, &[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unknown_desired_type_fails() {
        let desired = Desired::new("nope", "x", Attributes::new());
        let err = plan_desired(&registry(), &MemoryStore::new(), &[desired]).unwrap_err();
        assert!(format!("{err:#}").contains("unknown resource type 'nope'"));
    }

    #[test]
    fn test_duplicate_instance_fails() {
        assert!(plan_desired(&registry(), &MemoryStore::new(), &[web(), web()]).is_err());
    }
}
