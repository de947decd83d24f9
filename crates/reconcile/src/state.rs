//! Durable resource state and the store abstraction
//!
//! A [`State`] is the last snapshot known to be true upstream: an identifier
//! (empty means the resource does not exist) and the attribute values that
//! were confirmed for it. The engine never decides where state lives; it
//! loads and saves through a [`StateStore`].

use crate::value::Attributes;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Last known-durable snapshot of a resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Upstream identifier; empty when the resource does not exist
    #[serde(default)]
    pub id: String,
    /// Confirmed attribute values
    #[serde(default)]
    pub attributes: Attributes,
    /// Schema version the attributes were written with
    #[serde(default)]
    pub schema_version: u64,
}

impl State {
    /// State of a resource that does not exist
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn new(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
            schema_version: 0,
        }
    }

    pub fn with_schema_version(mut self, version: u64) -> Self {
        self.schema_version = version;
        self
    }

    /// Check if the resource exists
    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Load/save pair for durable state
///
/// Implementations decide the storage medium. A key that was never saved
/// loads as [`State::absent`].
pub trait StateStore: Send + Sync {
    /// Load the state stored under `key`
    fn load_state(&self, key: &str) -> Result<State>;

    /// Persist `state` under `key`
    fn save_state(&self, key: &str, state: &State) -> Result<()>;

    /// Forget the state stored under `key`
    fn remove_state(&self, key: &str) -> Result<()>;

    /// Keys with stored state
    fn keys(&self) -> Result<Vec<String>>;

    /// Save existing resources, remove destroyed ones
    fn store(&self, key: &str, state: &State) -> Result<()> {
        if state.exists() {
            self.save_state(key, state)
        } else {
            self.remove_state(key)
        }
    }
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: Mutex<BTreeMap<String, State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, BTreeMap<String, State>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn load_state(&self, key: &str) -> Result<State> {
        Ok(self.states().get(key).cloned().unwrap_or_default())
    }

    fn save_state(&self, key: &str, state: &State) -> Result<()> {
        self.states().insert(key.to_string(), state.clone());
        Ok(())
    }

    fn remove_state(&self, key: &str) -> Result<()> {
        self.states().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.states().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_state() {
        let state = State::absent();
        assert!(!state.exists());
        assert!(state.attributes.is_empty());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.load_state("web").unwrap(), State::absent());

        let state = State::new("i-123", Attributes::new().with("address", "10.0.0.1"));
        store.store("web", &state).unwrap();
        assert_eq!(store.load_state("web").unwrap(), state);
        assert_eq!(store.keys().unwrap(), vec!["web".to_string()]);

        store.store("web", &State::absent()).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_state_layout() {
        let state = State::new("abc", Attributes::new().with("address", "x"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["attributes"]["address"]["value"], "x");
    }
}
