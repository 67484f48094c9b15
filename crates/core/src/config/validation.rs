//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, StoreKind};
use thiserror::Error;

/// Upper bound for a stored index entry (a URL).
const MAX_INDEX_ENTRY_LIMIT: usize = 64 * 1024;

/// Upper bound for the transform's downstream channel.
const MAX_BODY_CHANNEL_CAPACITY: usize = 1024;

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
    /// - `max_index_entry_bytes` is 0 or exceeds 64KiB
    /// - `body_channel_capacity` is 0 or exceeds 1024
    /// - `store` is `sqlite` and `db_path` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_index_entry_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_index_entry_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_index_entry_bytes > MAX_INDEX_ENTRY_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_index_entry_bytes".into(),
                reason: "must not exceed 64KiB".into(),
            });
        }

        if self.body_channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "body_channel_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.body_channel_capacity > MAX_BODY_CHANNEL_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "body_channel_capacity".into(),
                reason: "must not exceed 1024".into(),
            });
        }

        if self.store == StoreKind::Sqlite && self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "required for sqlite store".into() });
        }

        if !self.digest_index && !self.digest_resolution && !self.link_fallback {
            tracing::warn!("digest_index, digest_resolution and link_fallback are all disabled; filter is a no-op");
        }

        Ok(())
    }
}
