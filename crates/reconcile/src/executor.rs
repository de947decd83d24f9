//! Execution engine - reconciles plan instances in parallel
//!
//! Instances are independent: each loads its own state, runs a lifecycle
//! cycle and stores whatever state the cycle returned, even when the cycle
//! reported errors. The state store is the only shared object.

use crate::context::ProgressCallback;
use crate::diff::Action;
use crate::error::ReconcileError;
use crate::lifecycle::Lifecycle;
use crate::planner::{ExecutionPlan, Instance};
use crate::state::StateStore;
use crate::types::{ExecuteOptions, ExecuteSummary, InstanceReport};
use anyhow::Result;
use rayon::prelude::*;

/// Execute a plan against a state store
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `store` - Where instance state is loaded from and saved to
/// * `opts` - Execution options (dry_run, jobs, reconcile options)
/// * `progress` - Progress callback
///
/// # Returns
/// Summary of execution results. Per-instance failures are recorded in the
/// summary; an `Err` means the plan could not be run at all.
pub fn execute<P: ProgressCallback>(
    plan: &ExecutionPlan,
    store: &dyn StateStore,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();
    if plan.is_empty() {
        return Ok(summary);
    }

    progress.on_batch_start(plan.len());

    let reports = if opts.jobs <= 1 || plan.len() == 1 {
        // Sequential execution
        let mut reports = Vec::with_capacity(plan.len());
        for instance in &plan.instances {
            progress.on_instance_start(&instance.key, instance.resource_type());
            let report = reconcile_instance(instance, store, opts);
            progress.on_instance_complete(&report);
            reports.push(report);
        }
        reports
    } else {
        let reports = execute_parallel(plan, store, opts)?;
        for report in &reports {
            progress.on_instance_complete(report);
        }
        reports
    };

    for report in reports {
        summary.add_report(report);
    }
    progress.on_batch_complete(&summary);

    Ok(summary)
}

/// Reconcile instances in parallel using rayon, keeping plan order
fn execute_parallel(
    plan: &ExecutionPlan,
    store: &dyn StateStore,
    opts: &ExecuteOptions,
) -> Result<Vec<InstanceReport>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    Ok(pool.install(|| {
        plan.instances
            .par_iter()
            .map(|instance| reconcile_instance(instance, store, opts))
            .collect()
    }))
}

/// Run one lifecycle cycle and persist its result
fn reconcile_instance(
    instance: &Instance,
    store: &dyn StateStore,
    opts: &ExecuteOptions,
) -> InstanceReport {
    let mut report = InstanceReport {
        key: instance.key.clone(),
        resource_type: instance.resource_type().to_string(),
        action: Action::NoOp,
        changes: 0,
        exists: false,
        errors: Vec::new(),
    };

    let prior = match store.load_state(&instance.key) {
        Ok(state) => state,
        Err(source) => {
            let err = ReconcileError::Store {
                key: instance.key.clone(),
                source,
            };
            report.errors.push(err.to_string());
            return report;
        }
    };

    let lifecycle = Lifecycle::new(instance.resource.as_ref(), opts.reconcile.clone());
    let config = instance.config.as_ref();

    if opts.dry_run {
        report.exists = prior.exists();
        match lifecycle.plan(config, &prior) {
            Ok(diff) => {
                report.action = diff.action;
                report.changes = diff.changes.len();
            }
            Err(err) => report.errors.push(err.to_string()),
        }
        return report;
    }

    let outcome = lifecycle.reconcile(config, prior.clone());
    report.action = outcome.action;
    report.changes = outcome.diff.changes.len();
    report.exists = outcome.state.exists();
    report.errors = outcome.errors.iter().map(ToString::to_string).collect();

    if outcome.state != prior {
        if let Err(source) = store.store(&instance.key, &outcome.state) {
            let err = ReconcileError::Store {
                key: instance.key.clone(),
                source,
            };
            log::error!("{err:#}");
            report.errors.push(err.to_string());
        } else {
            log::debug!("Stored state for {}", instance.key);
        }
    }

    report
}
