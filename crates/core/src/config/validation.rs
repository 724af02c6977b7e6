//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, SourceKind};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("unknown documentation source: {0}")]
    UnknownSource(String),
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `retries` exceeds 5
    /// - `max_pages` is 0
    /// - `user_agent` is empty
    /// - a source URL does not parse, or a `pages` source is not http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
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

        if self.retries > 5 {
            return Err(ConfigError::Invalid { field: "retries".into(), reason: "must not exceed 5".into() });
        }

        if self.max_pages == 0 {
            return Err(ConfigError::Invalid { field: "max_pages".into(), reason: "must be greater than 0".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (name, source) in &self.sources {
            let field = format!("sources.{name}.url");
            if source.kind == SourceKind::Git {
                if source.url.trim().is_empty() {
                    return Err(ConfigError::Invalid { field, reason: "must not be empty".into() });
                }
                continue;
            }

            let url = url::Url::parse(&source.url)
                .map_err(|e| ConfigError::Invalid { field: field.clone(), reason: e.to_string() })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid { field, reason: format!("unsupported scheme: {}", url.scheme()) });
            }
            if source.extensions.is_empty() {
                tracing::warn!(source = %name, "no extensions configured; crawl will keep nothing");
            }
        }

        Ok(())
    }
}
