//! Configuration validation rules.
//!
//! Validation runs after figment extraction so every source (defaults,
//! file, environment) passes through the same checks.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration loading and validation errors.
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
    /// - window dimensions are 0
    /// - the render timeout is 0 or exceeds 5 minutes
    /// - the queue capacity or worker count is 0
    /// - the semaphore capacity is 0
    /// - either API key is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.renderer.window_width == 0 {
            return Err(invalid("renderer.window_width", "must be greater than 0"));
        }
        if self.renderer.window_height == 0 {
            return Err(invalid("renderer.window_height", "must be greater than 0"));
        }

        if self.renderer.timeout == 0 {
            return Err(invalid("renderer.timeout", "must be at least 1 second"));
        }
        if self.renderer.timeout > 300 {
            return Err(invalid("renderer.timeout", "must not exceed 5 minutes (300s)"));
        }

        if self.queue.capacity == 0 {
            return Err(invalid("queue.capacity", "must be greater than 0"));
        }
        if self.queue.workers == 0 {
            return Err(invalid("queue.workers", "must be greater than 0"));
        }

        if self.semaphore.capacity == 0 {
            return Err(invalid("semaphore.capacity", "must be greater than 0"));
        }

        if self.app.key.is_empty() {
            return Err(invalid("app.key", "must not be empty"));
        }
        if self.app.admin_key.is_empty() {
            return Err(invalid("app.admin_key", "must not be empty"));
        }

        if self.app.tls && (self.app.tls_cert.is_none() || self.app.tls_key.is_none()) {
            return Err(invalid("app.tls", "tls_cert and tls_key are required when tls is enabled"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
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
    fn test_validate_zero_window() {
        let mut config = AppConfig::default();
        config.renderer.window_width = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "renderer.window_width"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let mut config = AppConfig::default();
        config.renderer.timeout = 0;
        assert!(config.validate().is_err());

        config.renderer.timeout = 301;
        assert!(config.validate().is_err());

        config.renderer.timeout = 300;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_queue() {
        let mut config = AppConfig::default();
        config.queue.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "queue.capacity"
        ));
    }

    #[test]
    fn test_validate_zero_semaphore() {
        let mut config = AppConfig::default();
        config.semaphore.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_key() {
        let mut config = AppConfig::default();
        config.app.key = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "app.key"
        ));
    }

    #[test]
    fn test_validate_tls_requires_material() {
        let mut config = AppConfig::default();
        config.app.tls = true;
        assert!(config.validate().is_err());

        config.app.tls_cert = Some("cert.pem".into());
        config.app.tls_key = Some("key.pem".into());
        assert!(config.validate().is_ok());
    }
}
