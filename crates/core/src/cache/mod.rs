//! Cache keys and cache store backends.
//!
//! The filter talks to the proxy's cache through the [`CacheStore`] trait.
//! Two backends are provided:
//!
//! - [`MemoryStore`]: in-process map, used by tests and the default harness
//! - [`SqliteStore`]: persistent store using SQLite in WAL mode with async
//!   access via tokio-rusqlite

pub mod connection;
pub mod key;
pub mod memory;
pub mod migrations;
pub mod objects;
pub mod store;

pub use crate::Error;

pub use connection::SqliteStore;
pub use key::{CacheKey, KEY_LEN};
pub use memory::MemoryStore;
pub use store::{CacheReader, CacheStore, CacheWrite};
