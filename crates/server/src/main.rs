//! metadup harness entry point.
//!
//! Reads one proxied transaction per line on stdin, runs it through the
//! dedup filter, and writes one JSON result per line on stdout.
//! Logging goes to stderr to keep stdout a clean result channel.

use std::sync::Arc;

use anyhow::Result;
use metadup_core::{AppConfig, CacheStore, MemoryStore, SqliteStore, StoreKind};
use metadup_filter::{DedupFilter, FilterConfig};
use tokio::io::{BufReader, stdin, stdout};
use tracing_subscriber::EnvFilter;

mod driver;
mod error;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(store = ?config.store, "Starting metadup on stdio");

    let store: Arc<dyn CacheStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sqlite => Arc::new(SqliteStore::open(&config.db_path).await?),
    };

    let filter = DedupFilter::new(store, FilterConfig::from(&config));
    let driver = driver::Driver::new(filter, config.body_channel_capacity);
    let handled = driver.serve(BufReader::new(stdin()), stdout()).await?;

    tracing::info!(transactions = handled, "stdin closed, shutting down");

    Ok(())
}
