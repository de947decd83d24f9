//! Core types shared across the engine

use crate::diff::Action;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle operation a callback implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// How a replacement is sequenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    /// Delete the existing instance, then create the new one
    #[default]
    DestroyBeforeCreate,
    /// Create the new instance first, then delete the old one
    CreateBeforeDestroy,
}

/// Options for a single reconciliation cycle
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Run Read before diffing so the diff starts from observed reality
    pub refresh: bool,
    /// Sequencing of replacements
    pub replace_strategy: ReplaceStrategy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            refresh: true,
            replace_strategy: ReplaceStrategy::default(),
        }
    }
}

/// Options for executing a plan of many instances
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Only compute diffs, never invoke callbacks
    pub dry_run: bool,
    /// Number of instances reconciled in parallel
    pub jobs: usize,
    /// Per-instance reconciliation options
    pub reconcile: ReconcileOptions,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            reconcile: ReconcileOptions::default(),
        }
    }
}

/// What happened to one instance during execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceReport {
    /// Instance key in the state store
    pub key: String,
    /// Resource type of the instance
    pub resource_type: String,
    /// Action that was applied (or planned, in a dry run)
    pub action: Action,
    /// Number of attribute-level changes in the diff
    pub changes: usize,
    /// Whether a resource exists after the cycle
    pub exists: bool,
    /// Rendered errors, empty on success
    pub errors: Vec<String>,
}

impl InstanceReport {
    /// Check if the instance reconciled without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub destroyed: usize,
    pub no_change: usize,
    pub failed: usize,
    /// Per-instance reports, in plan order
    #[serde(default)]
    pub reports: Vec<InstanceReport>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.destroyed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    /// Add a report to the summary
    pub fn add_report(&mut self, report: InstanceReport) {
        if !report.is_success() {
            self.failed += 1;
        } else {
            match report.action {
                Action::NoOp => self.no_change += 1,
                Action::Create => self.created += 1,
                Action::Update => self.updated += 1,
                Action::Replace => self.replaced += 1,
                Action::Destroy => self.destroyed += 1,
            }
        }
        self.reports.push(report);
    }
}
