//! Cache store doubles for unit tests.

use async_trait::async_trait;
use metadup_core::{CacheKey, CacheReader, CacheStore, CacheWrite, Error, MemoryStore};

/// Wraps a [`MemoryStore`] and fails every read of the listed keys.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    failing: Vec<CacheKey>,
}

impl FailingStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self { inner, failing: Vec::new() }
    }

    pub(crate) fn fail_reads_of(mut self, url: &str) -> Self {
        self.failing.push(CacheKey::from_url(url).unwrap());
        self
    }

    pub(crate) fn fail_reads_of_key(mut self, key: CacheKey) -> Self {
        self.failing.push(key);
        self
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn open_read(&self, key: &CacheKey) -> Result<Option<CacheReader>, Error> {
        if self.failing.contains(key) {
            return Err(Error::Store(format!("read of {key} failed")));
        }
        self.inner.open_read(key).await
    }

    async fn open_write(&self, key: &CacheKey) -> Result<Box<dyn CacheWrite>, Error> {
        self.inner.open_write(key).await
    }

    async fn evict(&self, key: &CacheKey) -> Result<bool, Error> {
        self.inner.evict(key).await
    }
}
