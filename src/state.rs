//! File-backed state store
//!
//! One JSON document per instance under the state directory. Each document
//! wraps the engine's [`State`] in a small envelope with a save counter and
//! timestamp, so a stale file is easy to spot by hand.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{State, StateStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// On-disk envelope around an instance's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub resource_type: String,
    /// Incremented on every save
    pub serial: u64,
    pub last_updated: DateTime<Utc>,
    pub state: State,
}

/// State store keeping one JSON file per instance key
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.chars().any(char::is_control)
        {
            anyhow::bail!("Invalid state key: {key:?}");
        }
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    /// Read the full envelope for `key`, if any
    pub fn load_file(&self, key: &str) -> Result<Option<StateFile>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let file: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(Some(file))
    }
}

/// Resource type part of an instance key (`type.name`)
pub fn resource_type_of(key: &str) -> &str {
    key.split_once('.').map_or(key, |(resource_type, _)| resource_type)
}

impl StateStore for FileStateStore {
    fn load_state(&self, key: &str) -> Result<State> {
        Ok(self.load_file(key)?.map(|f| f.state).unwrap_or_default())
    }

    fn save_state(&self, key: &str, state: &State) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory: {}", self.dir.display()))?;

        let serial = self.load_file(key)?.map_or(0, |f| f.serial) + 1;
        let file = StateFile {
            resource_type: resource_type_of(key).to_string(),
            serial,
            last_updated: Utc::now(),
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&file).context("Failed to serialize state")?;

        // Write to a sibling file first so a crash never leaves a truncated document
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {} (serial {serial})", path.display());
        Ok(())
    }

    fn remove_state(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed state file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove state file: {}", path.display())),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read state directory: {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{Attributes, Value};
    use tempfile::TempDir;

    fn server_state() -> State {
        State::new(
            "srv-1",
            Attributes::new()
                .with("address", "10.0.0.1")
                .with("ports", Value::set(vec![Value::Int(80), Value::Int(443)])),
        )
    }

    #[test]
    fn test_missing_key_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));
        assert_eq!(store.load_state("server.web").unwrap(), State::absent());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save_state("server.web", &server_state()).unwrap();

        assert_eq!(store.load_state("server.web").unwrap(), server_state());
        let file = store.load_file("server.web").unwrap().unwrap();
        assert_eq!(file.resource_type, "server");
        assert_eq!(file.serial, 1);
        assert!(!dir.path().join("server.web.json.tmp").exists());
    }

    #[test]
    fn test_serial_increments() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save_state("server.web", &server_state()).unwrap();
        store.save_state("server.web", &server_state()).unwrap();
        assert_eq!(store.load_file("server.web").unwrap().unwrap().serial, 2);
    }

    #[test]
    fn test_remove_and_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save_state("server.web", &server_state()).unwrap();
        store.save_state("dns_record.www", &server_state()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["dns_record.www", "server.web"]);

        store.remove_state("server.web").unwrap();
        store.remove_state("server.web").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["dns_record.www"]);
    }

    #[test]
    fn test_store_removes_absent_state() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.store("server.web", &server_state()).unwrap();
        store.store("server.web", &State::absent()).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let store = FileStateStore::new("/tmp");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("a/b").is_err());
        assert!(store.path_for("").is_err());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("server.web.json"), "{not json").unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.load_state("server.web").is_err());
    }

    #[test]
    fn test_resource_type_of() {
        assert_eq!(resource_type_of("server.web"), "server");
        assert_eq!(resource_type_of("dns_record.www.example.com"), "dns_record");
        assert_eq!(resource_type_of("bare"), "bare");
    }
}
