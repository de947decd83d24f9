//! Execution engine for statecraft
//!
//! The engine orchestrates:
//! 1. Planning - desired instances plus destroys for orphaned state
//! 2. Reconciling - one lifecycle cycle per instance, in parallel
//! 3. Persisting - every resulting state goes to the file store

pub mod planner;

pub use planner::{Desired, plan_desired};

use crate::config::Settings;
use crate::registry::Registry;
use crate::state::FileStateStore;
use anyhow::Result;
use reconcile::{ExecuteSummary, ProgressCallback, execute};

/// Reconcile the desired set against the state directory from `settings`
pub fn run<P: ProgressCallback>(
    settings: &Settings,
    registry: &Registry,
    desired: &[Desired],
    progress: &mut P,
) -> Result<ExecuteSummary> {
    settings.validate()?;
    let store = FileStateStore::new(settings.state_dir()?);
    log::debug!("Using state store at {}", store.dir().display());

    let plan = plan_desired(registry, &store, desired)?;
    execute(&plan, &store, &settings.execute_options(), progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use reconcile::{Attributes, NoProgress, StateStore};
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            state_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    fn server(name: &str, size: &str) -> Desired {
        Desired::new(
            "fake_server",
            name,
            Attributes::new().with("name", name).with("size", size),
        )
    }

    #[test]
    fn test_full_lifecycle() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let server_type = FakeServer::new();
        let cloud = server_type.cloud();
        let mut registry = Registry::new();
        registry.register(server_type).unwrap();

        // Create
        let desired = vec![server("web", "small"), server("db", "large")];
        let summary = run(&settings, &registry, &desired, &mut NoProgress).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(cloud.lock().unwrap().len(), 2);

        let store = FileStateStore::new(dir.path());
        let web = store.load_state("fake_server.web").unwrap();
        assert!(web.exists());
        assert!(web.attributes.contains_key("public_ip"));

        // Converged
        let summary = run(&settings, &registry, &desired, &mut NoProgress).unwrap();
        assert_eq!(summary.no_change, 2);
        assert_eq!(summary.total_changes(), 0);

        // Update in place
        let desired = vec![server("web", "medium"), server("db", "large")];
        let summary = run(&settings, &registry, &desired, &mut NoProgress).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(cloud.lock().unwrap()[&web.id]["size"], "medium");

        // Drop db from the desired set
        let summary = run(&settings, &registry, &desired[..1], &mut NoProgress).unwrap();
        assert_eq!(summary.destroyed, 1);
        assert_eq!(store.keys().unwrap(), vec!["fake_server.web"]);
        assert_eq!(cloud.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_recreates_after_out_of_band_delete() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let server_type = FakeServer::new();
        let cloud = server_type.cloud();
        let mut registry = Registry::new();
        registry.register(server_type).unwrap();

        let desired = vec![server("web", "small")];
        run(&settings, &registry, &desired, &mut NoProgress).unwrap();
        cloud.lock().unwrap().clear();

        let summary = run(&settings, &registry, &desired, &mut NoProgress).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(cloud.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            dry_run: true,
            ..settings(&dir)
        };
        let server_type = FakeServer::new();
        let cloud = server_type.cloud();
        let mut registry = Registry::new();
        registry.register(server_type).unwrap();

        let summary = run(&settings, &registry, &[server("web", "small")], &mut NoProgress).unwrap();
        assert_eq!(summary.created, 1);
        assert!(cloud.lock().unwrap().is_empty());
        assert!(FileStateStore::new(dir.path()).keys().unwrap().is_empty());
    }
}
