//! Host settings, loaded from `<config_dir>/statecraft.toml`
//!
//! ```toml
//! state_dir = "~/.local/state/statecraft"
//! jobs = 8
//! refresh = true
//! replace_strategy = "create-before-destroy"
//! ```

use crate::paths;
use anyhow::{Context, Result};
use reconcile::{ExecuteOptions, ReconcileOptions, ReplaceStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "statecraft.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where instance state files live; defaults to [`paths::state_dir`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
    /// Instances reconciled in parallel
    pub jobs: usize,
    /// Read every existing instance before diffing
    pub refresh: bool,
    pub replace_strategy: ReplaceStrategy,
    /// Plan only, never invoke callbacks
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: None,
            jobs: 4,
            refresh: true,
            replace_strategy: ReplaceStrategy::default(),
            dry_run: false,
        }
    }
}

impl Settings {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_dir()?.join(SETTINGS_FILE))
    }

    /// Load from a specific file, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Settings file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in settings file: {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }
        if let Some(dir) = &self.state_dir
            && dir.trim().is_empty()
        {
            anyhow::bail!("state_dir cannot be empty");
        }
        Ok(())
    }

    /// Resolved state directory
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(paths::expand(dir)),
            None => paths::state_dir(),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            refresh: self.refresh,
            replace_strategy: self.replace_strategy,
        }
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            jobs: self.jobs,
            reconcile: self.reconcile_options(),
        }
    }
}
