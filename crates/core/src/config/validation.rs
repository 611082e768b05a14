//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `script_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `navigation_timeout_ms` is less than 100ms or exceeds 10 minutes
    /// - `refresh_batch_size` is 0 or exceeds 500
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "script_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.script_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "script_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.navigation_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.navigation_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must not exceed 10 minutes (600000ms)".into(),
            });
        }

        if self.refresh_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_batch_size".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.refresh_batch_size > 500 {
            return Err(ConfigError::Invalid {
                field: "refresh_batch_size".into(),
                reason: "must not exceed 500".into(),
            });
        }

        if self.script_timeout_ms > self.navigation_timeout_ms {
            tracing::warn!(
                script_timeout_ms = self.script_timeout_ms,
                navigation_timeout_ms = self.navigation_timeout_ms,
                "script_timeout_ms exceeds navigation_timeout_ms; each budget \
                 still bounds its own phase"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_script_timeout_too_small() {
        let config = AppConfig { script_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "script_timeout_ms"));
    }

    #[test]
    fn test_validate_script_timeout_exceeds_limit() {
        let config = AppConfig { script_timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "script_timeout_ms"));
    }

    #[test]
    fn test_validate_navigation_timeout_exceeds_limit() {
        let config = AppConfig { navigation_timeout_ms: 601_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));
    }

    #[test]
    fn test_validate_batch_size_zero() {
        let config = AppConfig { refresh_batch_size: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "refresh_batch_size"));
    }

    #[test]
    fn test_validate_batch_size_exceeds_limit() {
        let config = AppConfig { refresh_batch_size: 501, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "refresh_batch_size"));
    }

    #[test]
    fn test_validate_script_timeout_above_navigation() {
        let config = AppConfig {
            script_timeout_ms: 120_000,
            navigation_timeout_ms: 1_000,
            ..Default::default()
        }; // warned, not rejected
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            script_timeout_ms: 100,
            navigation_timeout_ms: 100,
            refresh_batch_size: 1,
            ..Default::default()
        }; // minimum valid values
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_values() {
        let config = AppConfig {
            script_timeout_ms: 300_000,
            navigation_timeout_ms: 600_000,
            refresh_batch_size: 500,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
