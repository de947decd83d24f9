//! Progress reporting for plan execution
//!
//! The executor reports through [`ProgressCallback`] so the engine does not
//! depend on any particular UI.

use crate::types::{ExecuteSummary, InstanceReport};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting to reconcile a batch of instances
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting a single instance
    ///
    /// Only called for sequential execution; parallel runs report
    /// completions after the batch finishes.
    fn on_instance_start(&mut self, key: &str, resource_type: &str);

    /// Called when an instance completes
    fn on_instance_complete(&mut self, report: &InstanceReport);

    /// Called when a batch completes
    fn on_batch_complete(&mut self, summary: &ExecuteSummary);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_instance_start(&mut self, _key: &str, _resource_type: &str) {}
    fn on_instance_complete(&mut self, _report: &InstanceReport) {}
    fn on_batch_complete(&mut self, _summary: &ExecuteSummary) {}
}

/// Progress callback that writes to the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, count: usize) {
        log::info!("Reconciling {count} instance(s)");
    }

    fn on_instance_start(&mut self, key: &str, resource_type: &str) {
        log::debug!("Reconciling {resource_type} {key}");
    }

    fn on_instance_complete(&mut self, report: &InstanceReport) {
        if report.is_success() {
            log::info!(
                "{} {}: {:?} ({} change(s))",
                report.resource_type,
                report.key,
                report.action,
                report.changes
            );
        } else {
            for error in &report.errors {
                log::error!("{} {}: {error}", report.resource_type, report.key);
            }
        }
    }

    fn on_batch_complete(&mut self, summary: &ExecuteSummary) {
        log::info!(
            "{} created, {} updated, {} replaced, {} destroyed, {} unchanged, {} failed",
            summary.created,
            summary.updated,
            summary.replaced,
            summary.destroyed,
            summary.no_change,
            summary.failed
        );
    }
}
