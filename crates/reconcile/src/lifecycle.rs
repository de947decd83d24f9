//! Lifecycle orchestrator
//!
//! Drives one resource instance through
//! `Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent`.
//! Given a diff it invokes the matching callback, then decides what is
//! durable with [`persist`]. That decision depends only on the prior state,
//! what the callback left in its working set and the partial-state ledger.
//! A callback error never skips persistence; it is reported alongside the
//! resulting state.

use crate::data::ResourceData;
use crate::diff::{self, Action, Diff};
use crate::error::{ReconcileError, Result};
use crate::partial::PartialState;
use crate::resource::Resource;
use crate::state::State;
use crate::types::{Operation, ReconcileOptions, ReplaceStrategy};
use crate::value::Attributes;

/// Result of a reconciliation cycle
///
/// `state` is always definitive: it is what the caller must save, whether or
/// not `errors` is empty.
#[derive(Debug)]
pub struct Outcome {
    pub state: State,
    pub action: Action,
    pub diff: Diff,
    pub errors: Vec<ReconcileError>,
}

impl Outcome {
    fn new(state: State, diff: Diff) -> Self {
        Self {
            state,
            action: diff.action,
            diff,
            errors: Vec::new(),
        }
    }

    fn failed(state: State, error: ReconcileError) -> Self {
        Self {
            state,
            action: Action::NoOp,
            diff: Diff::empty(),
            errors: vec![error],
        }
    }

    fn with_errors(mut self, errors: Vec<ReconcileError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error raised during the cycle
    pub fn error(&self) -> Option<&ReconcileError> {
        self.errors.first()
    }

    pub fn into_parts(self) -> (State, Vec<ReconcileError>) {
        (self.state, self.errors)
    }
}

/// State and errors produced by a single callback invocation
type Step = (State, Vec<ReconcileError>);

/// Orchestrates lifecycle callbacks for one resource type
pub struct Lifecycle<'r> {
    resource: &'r dyn Resource,
    options: ReconcileOptions,
}

impl<'r> Lifecycle<'r> {
    pub fn new(resource: &'r dyn Resource, options: ReconcileOptions) -> Self {
        Self { resource, options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Check the schema and the configuration
    ///
    /// Runs before any callback; a failure here means no callback is
    /// invoked for the cycle.
    pub fn validate(&self, config: Option<&Attributes>) -> Result<()> {
        let schema = self.resource.schema();
        schema.check()?;
        if let Some(config) = config {
            schema.validate(config)?;
        }
        Ok(())
    }

    /// Upgrade state written by an older schema version
    pub fn upgrade(&self, state: State) -> Result<State> {
        let current = self.resource.schema().version;
        if !state.exists() || state.schema_version == current {
            return Ok(state);
        }
        if state.schema_version > current {
            return Err(ReconcileError::Migration {
                from: state.schema_version,
                source: anyhow::anyhow!(
                    "state was written by schema version {}, newer than {current}",
                    state.schema_version
                ),
            });
        }

        let mut attributes = state.attributes;
        for version in state.schema_version..current {
            attributes = self
                .resource
                .migrate_state(version, attributes)
                .map_err(|source| ReconcileError::Migration {
                    from: version,
                    source,
                })?;
        }
        log::debug!(
            "Migrated {} state {} from schema version {} to {current}",
            self.resource.resource_type(),
            state.id,
            state.schema_version
        );
        Ok(State::new(state.id, attributes).with_schema_version(current))
    }

    /// Compute the diff without invoking any callback
    pub fn plan(&self, config: Option<&Attributes>, prior: &State) -> Result<Diff> {
        self.validate(config)?;
        let state = self.upgrade(prior.clone())?;
        Ok(diff::compute(self.resource.schema(), config, &state))
    }

    /// Run a full cycle: validate, migrate, refresh, diff, apply
    ///
    /// `config` is `None` when the instance was removed from the desired set.
    pub fn reconcile(&self, config: Option<&Attributes>, prior: State) -> Outcome {
        if let Err(err) = self.validate(config) {
            log::warn!("{}: {err}", self.resource.resource_type());
            return Outcome::failed(prior, err);
        }

        let state = match self.upgrade(prior.clone()) {
            Ok(state) => state,
            Err(err) => return Outcome::failed(prior, err),
        };

        let state = if self.options.refresh && state.exists() {
            let refreshed = self.refresh(state);
            if !refreshed.is_success() {
                return refreshed;
            }
            refreshed.state
        } else {
            state
        };

        let diff = diff::compute(self.resource.schema(), config, &state);
        self.apply(diff, config, state)
    }

    /// Resynchronize state with upstream through Read
    pub fn refresh(&self, prior: State) -> Outcome {
        if !prior.exists() {
            return Outcome::new(prior, Diff::empty());
        }
        let (state, errors) = self.read(&prior);
        if !state.exists() {
            log::info!(
                "{} {} no longer exists upstream",
                self.resource.resource_type(),
                prior.id
            );
        }
        Outcome::new(state, Diff::empty()).with_errors(errors)
    }

    /// Invoke the callbacks a diff calls for
    pub fn apply(&self, diff: Diff, config: Option<&Attributes>, prior: State) -> Outcome {
        let resource_type = self.resource.resource_type();
        log::debug!("{resource_type} {}: {:?}", display_id(&prior), diff.action);

        match diff.action {
            Action::NoOp => Outcome::new(prior, diff),

            Action::Create => {
                let Some(config) = config else {
                    return Outcome::failed(prior, missing_config(Operation::Create));
                };
                if prior.exists() {
                    let err = ReconcileError::inconsistent(
                        Operation::Create,
                        format!("resource already exists with id {}", prior.id),
                    );
                    return Outcome::failed(prior, err);
                }
                let (state, errors) = self.create(config, &diff, &prior);
                Outcome::new(state, diff).with_errors(errors)
            }

            Action::Update => {
                let Some(config) = config else {
                    return Outcome::failed(prior, missing_config(Operation::Update));
                };
                if !prior.exists() {
                    return Outcome::failed(prior, not_found(Operation::Update));
                }
                let (state, errors) = self.update(config, &diff, &prior);
                Outcome::new(state, diff).with_errors(errors)
            }

            Action::Replace => {
                let Some(config) = config else {
                    return Outcome::failed(prior, missing_config(Operation::Create));
                };
                let (state, errors) = self.replace(config, &prior);
                Outcome::new(state, diff).with_errors(errors)
            }

            Action::Destroy => {
                if !prior.exists() {
                    return Outcome::failed(prior, not_found(Operation::Delete));
                }
                let (state, errors) = self.delete(&prior);
                Outcome::new(state, diff).with_errors(errors)
            }
        }
    }

    fn replace(&self, config: &Attributes, prior: &State) -> Step {
        let schema = self.resource.schema();
        let create_diff = diff::compute(schema, Some(config), &State::absent());

        if !prior.exists() {
            return self.create(config, &create_diff, prior);
        }

        match self.options.replace_strategy {
            ReplaceStrategy::DestroyBeforeCreate => {
                let (deleted, errors) = self.delete(prior);
                if !errors.is_empty() {
                    return (deleted, errors);
                }
                self.create(config, &create_diff, &deleted)
            }
            ReplaceStrategy::CreateBeforeDestroy => {
                let (created, mut errors) = self.create(config, &create_diff, &State::absent());
                if !created.exists() {
                    // Nothing new exists upstream; the old instance is still tracked
                    return (prior.clone(), errors);
                }
                if !errors.is_empty() {
                    errors.push(untracked(prior, "replacement was created with errors"));
                    return (created, errors);
                }

                let (deleted, delete_errors) = self.delete(prior);
                if deleted.exists() {
                    errors.extend(delete_errors);
                    errors.push(untracked(prior, "it could not be deleted"));
                }
                (created, errors)
            }
        }
    }

    fn create(&self, config: &Attributes, diff: &Diff, prior: &State) -> Step {
        let schema = self.resource.schema();
        let mut data = ResourceData::new(schema, &State::absent(), Some(config), diff.clone());
        let mut partial = PartialState::new();
        let result = self.resource.create(&mut data, &mut partial);
        self.finish(Operation::Create, prior, &data, &partial, result)
    }

    fn read(&self, prior: &State) -> Step {
        let mut data = ResourceData::from_state(self.resource.schema(), prior);
        let result = self.resource.read(&mut data);
        self.finish(Operation::Read, prior, &data, &PartialState::new(), result)
    }

    fn update(&self, config: &Attributes, diff: &Diff, prior: &State) -> Step {
        let schema = self.resource.schema();
        let mut data = ResourceData::new(schema, prior, Some(config), diff.clone());
        let mut partial = PartialState::new();
        let result = self.resource.update(&mut data, &mut partial);
        self.finish(Operation::Update, prior, &data, &partial, result)
    }

    fn delete(&self, prior: &State) -> Step {
        let data = ResourceData::from_state(self.resource.schema(), prior);
        let result = self.resource.delete(&data);
        self.finish(Operation::Delete, prior, &data, &PartialState::new(), result)
    }

    fn finish(
        &self,
        operation: Operation,
        prior: &State,
        data: &ResourceData<'_>,
        partial: &PartialState,
        result: anyhow::Result<()>,
    ) -> Step {
        let resource_type = self.resource.resource_type();
        let (state, inconsistent) = persist(operation, prior, data, partial, result.is_ok());

        let mut errors = Vec::new();
        match result {
            Ok(()) => log::debug!(
                "{resource_type} {operation} succeeded, id now {}",
                display_id(&state)
            ),
            Err(source) => {
                log::warn!("{resource_type} {operation} failed: {source:#}");
                errors.push(ReconcileError::callback(operation, source));
            }
        }
        if let Some(err) = inconsistent {
            log::error!("{resource_type}: {err}");
            errors.push(err);
        }
        (state, errors)
    }
}

/// Decide what is durable after a callback returned
///
/// - Create: persisted only once an id is set, error or not.
/// - Update: persisted in full unless partial mode was left enabled; an
///   Update that clears the id discards the state and is reported as
///   inconsistent.
/// - Read: an empty id is authoritative evidence of deletion. A failed Read
///   leaves the state untouched.
/// - Delete: success discards the state, failure keeps it unchanged.
///
/// With partial mode enabled only attributes marked safe take their new
/// values; everything else keeps the value it had before the call.
pub fn persist(
    operation: Operation,
    prior: &State,
    data: &ResourceData<'_>,
    partial: &PartialState,
    succeeded: bool,
) -> (State, Option<ReconcileError>) {
    match operation {
        Operation::Create if data.id().is_empty() => (prior.clone(), None),
        Operation::Create => (committed(data, partial), None),

        Operation::Update if data.id().is_empty() => (
            State::absent(),
            Some(ReconcileError::inconsistent(
                Operation::Update,
                format!("update cleared the id of {}", display_id(prior)),
            )),
        ),
        Operation::Update => (committed(data, partial), None),

        Operation::Read if !succeeded => (prior.clone(), None),
        Operation::Read if data.id().is_empty() => (State::absent(), None),
        Operation::Read => (
            State::new(data.id(), data.merged()).with_schema_version(data.schema().version),
            None,
        ),

        Operation::Delete if succeeded => (State::absent(), None),
        Operation::Delete => (prior.clone(), None),
    }
}

fn committed(data: &ResourceData<'_>, partial: &PartialState) -> State {
    let merged = data.merged();
    let attributes = if partial.is_enabled() {
        let mut attributes = data.prior().clone();
        for key in partial.safe_keys() {
            if let Some(value) = merged.get(key) {
                attributes.insert(key, value.clone());
            } else {
                attributes.remove(key);
            }
        }
        attributes
    } else {
        merged
    };
    State::new(data.id(), attributes).with_schema_version(data.schema().version)
}

fn display_id(state: &State) -> &str {
    if state.exists() { &state.id } else { "<new>" }
}

fn missing_config(operation: Operation) -> ReconcileError {
    ReconcileError::inconsistent(operation, "no configuration given")
}

fn not_found(operation: Operation) -> ReconcileError {
    ReconcileError::inconsistent(operation, "resource does not exist")
}

fn untracked(prior: &State, why: &str) -> ReconcileError {
    ReconcileError::inconsistent(
        Operation::Delete,
        format!("previous instance {} is no longer tracked: {why}", prior.id),
    )
}
