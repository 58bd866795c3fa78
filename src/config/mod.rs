//! Configuration module for modpack-updater
//!
//! Loads config from, in order: an explicit path, `<instance>/updater.toml`,
//! `$XDG_CONFIG_HOME/modpack-updater/config.toml` or `~/.config/modpack-updater/config.toml`.
//! Falls back to built-in defaults if no file exists.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use modpack_updater::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(None, Path::new(".")).expect("Failed to load config");
//! println!("Content API: {}", config.api.base_url);
//! println!("Resolution attempts: {}", config.retry.max_attempts);
//! ```

pub mod schema;

pub use schema::Config;

use crate::error::{Result, UpdaterError};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-instance config file
pub const INSTANCE_CONFIG_FILE: &str = "updater.toml";

impl Config {
    /// Load config, searching the standard locations when `explicit` is `None`
    pub fn load(explicit: Option<&Path>, instance_root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            // An explicitly requested file must exist
            return Self::from_file(path);
        }

        let candidates = [
            Some(instance_root.join(INSTANCE_CONFIG_FILE)),
            user_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            UpdaterError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
            .map_err(|e| UpdaterError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// User-level config path (`$XDG_CONFIG_HOME/modpack-updater/config.toml`)
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modpack-updater").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::schema::BackoffKind;
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://addons-ecs.forgesvc.net");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 3000);
        assert_eq!(config.retry.backoff, BackoffKind::Fixed);
        assert_eq!(config.archive_retry.max_attempts, 1);
        assert_eq!(config.sync.concurrency, 4);
        assert!(config.sync.cache_dir.is_none());
        assert!(config.sync.pause_on_exit);
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let config = Config::from_toml(
            r#"
            [retry]
            delay_ms = 10
            backoff = "exponential"

            [sync]
            concurrency = 8
            pause_on_exit = false
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.delay_ms, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);
        assert_eq!(config.sync.concurrency, 8);
        assert!(!config.sync.pause_on_exit);
        assert!(config.sync.progress);
        assert_eq!(config.archive_retry.max_attempts, 1);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let result = Config::from_toml("[retry]\nbackoff = \"random\"\n");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_load_prefers_instance_file() {
        let instance = TempDir::new().unwrap();
        let xdg = TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", xdg.path());

        let user_dir = xdg.path().join("modpack-updater");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(user_dir.join("config.toml"), "[sync]\nconcurrency = 2\n").unwrap();
        fs::write(
            instance.path().join(INSTANCE_CONFIG_FILE),
            "[sync]\nconcurrency = 7\n",
        )
        .unwrap();

        let config = Config::load(None, instance.path()).unwrap();
        assert_eq!(config.sync.concurrency, 7);

        fs::remove_file(instance.path().join(INSTANCE_CONFIG_FILE)).unwrap();
        let config = Config::load(None, instance.path()).unwrap();
        assert_eq!(config.sync.concurrency, 2);

        std::env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")), dir.path());
        assert!(matches!(result, Err(UpdaterError::Config(_))));
    }
}
