//! Partial-state ledger for a single Create or Update invocation
//!
//! A callback that talks to several upstream endpoints can fail halfway.
//! Enabling partial mode before the first upstream call tells the
//! orchestrator to persist only the attributes the callback has explicitly
//! confirmed with [`PartialState::mark_safe`]; every other attribute keeps
//! its prior durable value. Disabling partial mode again restores full
//! persistence.
//!
//! The ledger is created fresh for each invocation, handed to the callback
//! by reference, and dropped once the persistence decision is made. There is
//! no process-wide toggle.
//!
//! Persistence granularity is the top-level attribute: marking
//! `network.0.address` marks `network`.

use std::collections::BTreeSet;

/// Ledger of attributes that are safe to persist
#[derive(Debug, Default)]
pub struct PartialState {
    enabled: bool,
    safe: BTreeSet<String>,
}

impl PartialState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist only attributes marked safe from now on
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Return to persisting every attribute
    pub fn disable(&mut self) {
        self.enabled = false;
        self.safe.clear();
    }

    /// Mark an attribute as confirmed upstream
    pub fn mark_safe(&mut self, path: &str) {
        let key = path.split('.').next().unwrap_or(path);
        self.safe.insert(key.to_string());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the attribute may be persisted when the callback returns
    ///
    /// Always true while partial mode is disabled.
    pub fn is_safe(&self, key: &str) -> bool {
        !self.enabled || self.safe.contains(key)
    }

    /// Attributes marked safe so far
    pub fn safe_keys(&self) -> impl Iterator<Item = &str> {
        self.safe.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_marks_everything_safe() {
        let partial = PartialState::new();
        assert!(!partial.is_enabled());
        assert!(partial.is_safe("anything"));
    }

    #[test]
    fn test_enabled_only_marked_keys() {
        let mut partial = PartialState::new();
        partial.enable();
        partial.mark_safe("address");
        assert!(partial.is_safe("address"));
        assert!(!partial.is_safe("image"));
    }

    #[test]
    fn test_nested_path_marks_top_level() {
        let mut partial = PartialState::new();
        partial.enable();
        partial.mark_safe("network.0.address");
        assert!(partial.is_safe("network"));
        assert_eq!(partial.safe_keys().collect::<Vec<_>>(), vec!["network"]);
    }

    #[test]
    fn test_disable_restores_full_persistence() {
        let mut partial = PartialState::new();
        partial.enable();
        partial.mark_safe("address");
        partial.disable();
        assert!(partial.is_safe("image"));
        assert_eq!(partial.safe_keys().count(), 0);
    }
}
