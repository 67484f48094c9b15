//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (METADUP_*)
//! 2. TOML config file (if METADUP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which cache store backend the host hands to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (METADUP_*)
/// 2. TOML config file (if METADUP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache store backend.
    ///
    /// Set via METADUP_STORE environment variable (`memory` or `sqlite`).
    #[serde(default = "default_store")]
    pub store: StoreKind,

    /// Path to the SQLite cache database, used when `store` is `sqlite`.
    ///
    /// Set via METADUP_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Record (body digest -> request URL) index entries when a body completes.
    ///
    /// Set via METADUP_DIGEST_INDEX environment variable.
    #[serde(default = "default_true")]
    pub digest_index: bool,

    /// Consult RFC 3230 `Digest:` headers when deciding a rewrite.
    ///
    /// Set via METADUP_DIGEST_RESOLUTION environment variable.
    #[serde(default = "default_true")]
    pub digest_resolution: bool,

    /// Consult RFC 6249 `Link: <...>; rel=duplicate` headers.
    ///
    /// Set via METADUP_LINK_FALLBACK environment variable.
    #[serde(default = "default_true")]
    pub link_fallback: bool,

    /// Largest index entry payload read back before it is treated as corrupt.
    ///
    /// Set via METADUP_MAX_INDEX_ENTRY_BYTES environment variable.
    #[serde(default = "default_max_index_entry_bytes")]
    pub max_index_entry_bytes: usize,

    /// Chunks buffered between the digest transform and the client.
    ///
    /// Set via METADUP_BODY_CHANNEL_CAPACITY environment variable.
    #[serde(default = "default_body_channel_capacity")]
    pub body_channel_capacity: usize,
}

fn default_store() -> StoreKind {
    StoreKind::Memory
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./metadup-cache.sqlite")
}

fn default_true() -> bool {
    true
}

fn default_max_index_entry_bytes() -> usize {
    8192
}

fn default_body_channel_capacity() -> usize {
    16
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            db_path: default_db_path(),
            digest_index: true,
            digest_resolution: true,
            link_fallback: true,
            max_index_entry_bytes: default_max_index_entry_bytes(),
            body_channel_capacity: default_body_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `METADUP_`
    /// 2. TOML file from `METADUP_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("METADUP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("METADUP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.db_path, PathBuf::from("./metadup-cache.sqlite"));
        assert!(config.digest_index);
        assert!(config.digest_resolution);
        assert!(config.link_fallback);
        assert_eq!(config.max_index_entry_bytes, 8192);
        assert_eq!(config.body_channel_capacity, 16);
    }

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("METADUP_STORE", "sqlite");
            jail.set_env("METADUP_DB_PATH", "/tmp/dedup.sqlite");
            jail.set_env("METADUP_LINK_FALLBACK", "false");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.store, StoreKind::Sqlite);
            assert_eq!(config.db_path, PathBuf::from("/tmp/dedup.sqlite"));
            assert!(!config.link_fallback);
            assert!(config.digest_resolution);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("metadup.toml", "max_index_entry_bytes = 1024\ndigest_index = false\n")?;
            jail.set_env("METADUP_CONFIG_FILE", "metadup.toml");
            jail.set_env("METADUP_MAX_INDEX_ENTRY_BYTES", "2048");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.max_index_entry_bytes, 2048);
            assert!(!config.digest_index);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("METADUP_BODY_CHANNEL_CAPACITY", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "body_channel_capacity"));
            Ok(())
        });
    }
}
