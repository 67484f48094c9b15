//! In-process cache store.
//!
//! Uses a HashMap behind a tokio RwLock. Cheap to clone; clones share the
//! same map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::RwLock;

use super::key::CacheKey;
use super::store::{CacheReader, CacheStore, CacheWrite};
use crate::Error;

/// In-memory [`CacheStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<CacheKey, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` at `key` in one step.
    pub async fn insert(&self, key: CacheKey, payload: impl Into<Bytes>) {
        self.objects.write().await.insert(key, payload.into());
    }

    /// Number of committed objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open_read(&self, key: &CacheKey) -> Result<Option<CacheReader>, Error> {
        let objects = self.objects.read().await;
        Ok(objects
            .get(key)
            .map(|payload| CacheReader::from_bytes(key.clone(), payload.clone())))
    }

    async fn open_write(&self, key: &CacheKey) -> Result<Box<dyn CacheWrite>, Error> {
        Ok(Box::new(MemoryWrite { key: key.clone(), buf: BytesMut::new(), objects: Arc::clone(&self.objects) }))
    }

    async fn evict(&self, key: &CacheKey) -> Result<bool, Error> {
        Ok(self.objects.write().await.remove(key).is_some())
    }
}

/// Pending write; the map is only touched on commit.
struct MemoryWrite {
    key: CacheKey,
    buf: BytesMut,
    objects: Arc<RwLock<HashMap<CacheKey, Bytes>>>,
}

#[async_trait]
impl CacheWrite for MemoryWrite {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryWrite { key, buf, objects } = *self;
        objects.write().await.insert(key, buf.freeze());
        Ok(())
    }
}
