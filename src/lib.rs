//! # Statecraft
//!
//! Host layer around the [`reconcile`] engine: settings, path resolution,
//! logging, a file-backed state store and a registry of resource types.
//!
//! ```ignore
//! use statecraft::{Desired, Registry, Settings, engine, logging};
//!
//! logging::init(1, false);
//! let settings = Settings::load()?;
//!
//! let mut registry = Registry::new();
//! registry.register(Server::new(client))?;
//!
//! let desired = vec![Desired::new("server", "web", config)];
//! let summary = engine::run(&settings, &registry, &desired, &mut reconcile::LogProgress)?;
//! if !summary.is_success() {
//!     std::process::exit(1);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::Settings;
pub use engine::{Desired, plan_desired, run};
pub use registry::{Registry, RegistryError};
pub use state::FileStateStore;

pub use reconcile;
