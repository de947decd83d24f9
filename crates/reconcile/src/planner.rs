//! Execution planner - groups resource instances into a plan

use crate::resource::SharedResource;
use crate::value::Attributes;

/// One resource instance to reconcile
#[derive(Debug, Clone)]
pub struct Instance {
    /// Key the instance's state is stored under
    pub key: String,
    pub resource: SharedResource,
    /// Desired configuration; `None` destroys the instance
    pub config: Option<Attributes>,
}

impl Instance {
    pub fn new(key: impl Into<String>, resource: SharedResource, config: Attributes) -> Self {
        Self {
            key: key.into(),
            resource,
            config: Some(config),
        }
    }

    /// Instance that is no longer desired and should be destroyed
    pub fn orphan(key: impl Into<String>, resource: SharedResource) -> Self {
        Self {
            key: key.into(),
            resource,
            config: None,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource.resource_type()
    }
}

/// An execution plan of independent instances
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub instances: Vec<Instance>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the plan
    pub fn add(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Filter plan to only include instances matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Instance) -> bool,
    {
        Self {
            instances: self.instances.into_iter().filter(|i| predicate(i)).collect(),
        }
    }

    /// Filter plan to only include instances matching a target pattern
    ///
    /// Target format: "type" or "type.key"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, key) = parse_target(t);
                self.filter(|i| matches_filter(i, resource_type.as_deref(), key.as_deref()))
            }
        }
    }

    /// Total number of instances in the plan
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|i| i.key.as_str())
    }
}

/// Parse a target string like "type.key" into (type, key)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((resource_type, key)) => (Some(resource_type.to_string()), Some(key.to_string())),
    }
}

/// Check if an instance matches the filter criteria
fn matches_filter(instance: &Instance, resource_type: Option<&str>, key: Option<&str>) -> bool {
    if let Some(rt) = resource_type
        && instance.resource_type() != rt
    {
        return false;
    }

    if let Some(k) = key {
        // Keys may carry their type as a prefix ("server.web")
        let name = instance
            .key
            .strip_prefix(instance.resource_type())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(instance.key.as_str());
        if name != k && instance.key != k {
            return false;
        }
    }

    true
}
