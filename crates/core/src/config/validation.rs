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
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix` is empty or contains characters other than `[a-z0-9-]`
    /// - any asset, excluded path, `manifest_path` or `placeholder_image` is not origin-relative
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if !self
            .cache_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Invalid {
                field: "cache_prefix".into(),
                reason: "only lowercase letters, digits and '-' are allowed".into(),
            });
        }

        check_relative("manifest_path", &self.manifest_path)?;
        check_relative("placeholder_image", &self.placeholder_image)?;
        for asset in &self.static_assets {
            check_relative("static_assets", asset)?;
        }
        for prefix in &self.excluded_paths {
            check_relative("excluded_paths", prefix)?;
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.asset_manifest().contains(&self.placeholder_image) {
            tracing::warn!(
                placeholder = %self.placeholder_image,
                "placeholder_image is not pre-warmed; offline image requests will use the built-in placeholder"
            );
        }

        Ok(())
    }
}

fn check_relative(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') && !path.starts_with("//") {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field: field.into(), reason: format!("'{path}' must start with a single '/'") })
    }
}
