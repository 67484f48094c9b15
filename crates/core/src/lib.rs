//! Core types and shared functionality for metadup.
//!
//! This crate provides:
//! - Cache key derivation and URL canonicalization
//! - The cache store interface with memory and SQLite backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod url;

pub use cache::{CacheKey, CacheReader, CacheStore, CacheWrite, MemoryStore, SqliteStore};
pub use config::{AppConfig, ConfigError, StoreKind};
pub use error::Error;
