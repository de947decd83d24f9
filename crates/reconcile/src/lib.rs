//! # Reconcile
//!
//! A resource reconciliation engine.
//!
//! Given a resource's desired configuration and its last durable state, the
//! engine computes a diff, invokes the right lifecycle callback and decides
//! exactly which state is safe to persist, including when the callback
//! failed halfway.
//!
//! ## Core Concepts
//!
//! - **Schema**: typed attribute definitions (required/optional/computed,
//!   force-new, defaults, nested blocks, sets)
//! - **Value / Attributes**: tagged attribute values addressed by dotted paths
//! - **Diff**: attribute-level changes plus the overall [`Action`]
//! - **Resource**: a schema plus Create/Read/Update/Delete callbacks
//! - **Lifecycle**: runs one cycle for one instance and returns an
//!   [`Outcome`] with the next durable state
//! - **PartialState**: per-invocation ledger of attributes safe to persist
//! - **Executor**: reconciles many independent instances in parallel
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Attributes, Lifecycle, ReconcileOptions, State};
//!
//! let resource = Server::new(client);
//! let config = Attributes::new().with("address", "10.0.0.1");
//!
//! let outcome = Lifecycle::new(&resource, ReconcileOptions::default())
//!     .reconcile(Some(&config), store.load_state("web")?);
//!
//! // Always save, even when the cycle reported errors
//! store.store("web", &outcome.state)?;
//! for error in &outcome.errors {
//!     log::error!("{error}");
//! }
//! ```

pub mod context;
pub mod convert;
pub mod data;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod partial;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod state;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use convert::{expand, flatten};
pub use data::ResourceData;
pub use diff::{Action, AttributeChange, ChangeKind, Diff, DiffSummary};
pub use error::{ConvertError, ReconcileError, SchemaError, ValidationError};
pub use executor::execute;
pub use lifecycle::{Lifecycle, Outcome, persist};
pub use partial::PartialState;
pub use planner::{ExecutionPlan, Instance};
pub use resource::{Resource, SharedResource};
pub use retry::{RetryConfig, RetryError, with_retry};
pub use schema::{Attribute, NestingMode, Rule, Schema, Type};
pub use state::{MemoryStore, State, StateStore};
pub use types::{
    ExecuteOptions, ExecuteSummary, InstanceReport, Operation, ReconcileOptions, ReplaceStrategy,
};
pub use value::{Attributes, Value};
