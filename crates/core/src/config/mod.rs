//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (QUIRE_*)
//! 2. TOML config file (if QUIRE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (QUIRE_*)
/// 2. TOML config file (if QUIRE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite parser registry database.
    ///
    /// Set via QUIRE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding the parser script corpus for registry refresh.
    ///
    /// Set via QUIRE_CORPUS_DIR environment variable.
    /// Required only when a refresh is requested.
    #[serde(default)]
    pub corpus_dir: Option<PathBuf>,

    /// Directory holding a sideloaded support-script snapshot.
    ///
    /// Set via QUIRE_SUPPORT_DIR environment variable. When unset, the
    /// support scripts embedded in the binary are used.
    #[serde(default)]
    pub support_dir: Option<PathBuf>,

    /// Wall-clock budget for one parser script execution, in milliseconds.
    ///
    /// Set via QUIRE_SCRIPT_TIMEOUT_MS environment variable.
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,

    /// Page navigation timeout in milliseconds.
    ///
    /// Set via QUIRE_NAVIGATION_TIMEOUT_MS environment variable.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Number of corpus scripts processed per refresh batch.
    ///
    /// Set via QUIRE_REFRESH_BATCH_SIZE environment variable.
    #[serde(default = "default_refresh_batch_size")]
    pub refresh_batch_size: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./quire-registry.sqlite")
}

fn default_script_timeout_ms() -> u64 {
    30_000
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_refresh_batch_size() -> usize {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            corpus_dir: None,
            support_dir: None,
            script_timeout_ms: default_script_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            refresh_batch_size: default_refresh_batch_size(),
        }
    }
}

impl AppConfig {
    /// Script execution budget as a Duration.
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    /// Navigation timeout as a Duration.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `QUIRE_`
    /// 2. TOML file from `QUIRE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("QUIRE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("QUIRE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that a corpus directory is configured (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no corpus directory is set.
    pub fn require_corpus_dir(&self) -> Result<&Path, ConfigError> {
        self.corpus_dir.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "corpus_dir".into(),
            hint: "Set QUIRE_CORPUS_DIR environment variable or pass --corpus".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./quire-registry.sqlite"));
        assert_eq!(config.script_timeout_ms, 30_000);
        assert_eq!(config.navigation_timeout_ms, 60_000);
        assert_eq!(config.refresh_batch_size, 50);
        assert!(config.corpus_dir.is_none());
        assert!(config.support_dir.is_none());
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.script_timeout(), Duration::from_millis(30_000));
        assert_eq!(config.navigation_timeout(), Duration::from_millis(60_000));
    }

    #[test]
    fn test_require_corpus_dir_missing() {
        let config = AppConfig::default();
        let result = config.require_corpus_dir();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_corpus_dir_present() {
        let config =
            AppConfig { corpus_dir: Some(PathBuf::from("/tmp/parsers")), ..Default::default() };
        let result = config.require_corpus_dir();
        assert_eq!(result.unwrap(), Path::new("/tmp/parsers"));
    }
}
