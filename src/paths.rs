//! Centralized path resolution for statecraft
//!
//! # Environment Variables
//!
//! - `STATECRAFT_CONFIG_DIR` - Override config directory
//! - `STATECRAFT_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `STATECRAFT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/statecraft` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\statecraft`
//!    - macOS/Linux: `~/.config/statecraft`
//!
//! For state_dir():
//! 1. `STATECRAFT_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/statecraft` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\statecraft`
//!    - macOS/Linux: `~/.local/state/statecraft`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STATECRAFT_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STATECRAFT_STATE_DIR";

const APP_DIR: &str = "statecraft";

/// Get the statecraft config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(|key| std::env::var(key).ok())
}

/// Get the statecraft state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve_state_dir(|key| std::env::var(key).ok())
}

fn resolve_config_dir(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = env(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_config) = env("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

fn resolve_state_dir(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = env(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_state) = env("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables leave the input untouched.
///
/// # Examples
///
/// ```
/// use statecraft::paths;
///
/// let state = paths::expand("~/.local/state/statecraft");
/// let shared = paths::expand("$XDG_STATE_HOME/statecraft");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_dir_env_override() {
        let result = resolve_config_dir(env(&[
            (ENV_CONFIG_DIR, "/custom/config/path"),
            ("XDG_CONFIG_HOME", "/tmp/xdg"),
        ]))
        .unwrap();
        assert_eq!(result, PathBuf::from("/custom/config/path"));
    }

    #[test]
    fn test_config_dir_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        let result = resolve_config_dir(env(&[(ENV_CONFIG_DIR, "~/dotfiles/statecraft")])).unwrap();
        assert_eq!(result, home.join("dotfiles").join("statecraft"));
    }

    #[test]
    fn test_xdg_config_home() {
        let result = resolve_config_dir(env(&[("XDG_CONFIG_HOME", "/tmp/xdg-config")])).unwrap();
        assert_eq!(result, PathBuf::from("/tmp/xdg-config/statecraft"));
    }

    #[test]
    fn test_state_dir_env_override() {
        let result = resolve_state_dir(env(&[(ENV_STATE_DIR, "/custom/state/path")])).unwrap();
        assert_eq!(result, PathBuf::from("/custom/state/path"));
    }

    #[test]
    fn test_xdg_state_home() {
        let result = resolve_state_dir(env(&[("XDG_STATE_HOME", "/tmp/xdg-state")])).unwrap();
        assert_eq!(result, PathBuf::from("/tmp/xdg-state/statecraft"));
    }

    #[cfg(unix)]
    #[test]
    fn test_default_state_dir_unix() {
        let result = resolve_state_dir(env(&[])).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join(".local").join("state").join("statecraft"));
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
