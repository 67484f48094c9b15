//! Cache store interface.
//!
//! The filter only needs two operations from the proxy's cache: open an
//! object for reading by key, and open a key for writing. Written bytes stay
//! invisible to readers until the write handle is committed; dropping an
//! uncommitted handle abandons the write.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use super::key::CacheKey;
use crate::Error;

/// Chunk size used when a store replays a stored body as a stream.
pub const READ_CHUNK_SIZE: usize = 32 * 1024;

/// A cache object opened for reading.
///
/// Holds the object's payload as a stream of chunks, so callers that only
/// need to know an object exists never have to pull its body.
pub struct CacheReader {
    key: CacheKey,
    body: BoxStream<'static, Result<Bytes, Error>>,
}

impl CacheReader {
    /// Wrap a chunk stream produced by a store.
    pub fn new(key: CacheKey, body: BoxStream<'static, Result<Bytes, Error>>) -> Self {
        Self { key, body }
    }

    /// Replay an in-memory payload in `READ_CHUNK_SIZE` pieces.
    pub fn from_bytes(key: CacheKey, payload: Bytes) -> Self {
        let mut chunks = Vec::with_capacity(payload.len().div_ceil(READ_CHUNK_SIZE));
        let mut rest = payload;
        while !rest.is_empty() {
            let at = rest.len().min(READ_CHUNK_SIZE);
            chunks.push(Ok(rest.split_to(at)));
        }
        Self::new(key, stream::iter(chunks).boxed())
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Read the whole payload, refusing anything larger than `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if a chunk fails or the payload exceeds `limit`.
    pub async fn read_to_end(mut self, limit: usize) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            if buf.len() + chunk.len() > limit {
                return Err(Error::Store(format!("object {} exceeds {limit} bytes", self.key)));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for CacheReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReader").field("key", &self.key).finish_non_exhaustive()
    }
}

/// A cache key opened for writing.
#[async_trait]
pub trait CacheWrite: Send {
    /// Append bytes to the pending object.
    async fn write(&mut self, chunk: &[u8]) -> Result<(), Error>;

    /// Publish the pending object, replacing any previous object at the key.
    async fn commit(self: Box<Self>) -> Result<(), Error>;
}

/// Key/value cache shared by every transaction.
///
/// Implementations provide per-key atomicity only. Every returned future
/// resolves or fails; none are left pending forever.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open the object at `key`, or `None` when nothing is cached there.
    async fn open_read(&self, key: &CacheKey) -> Result<Option<CacheReader>, Error>;

    /// Open `key` for writing.
    async fn open_write(&self, key: &CacheKey) -> Result<Box<dyn CacheWrite>, Error>;

    /// Drop the object at `key`, returning whether one was stored.
    async fn evict(&self, key: &CacheKey) -> Result<bool, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::from_url("http://a/x").unwrap()
    }

    #[tokio::test]
    async fn test_reader_roundtrip_large_payload() {
        let payload = Bytes::from(vec![0xabu8; READ_CHUNK_SIZE * 2 + 5]);
        let reader = CacheReader::from_bytes(key(), payload.clone());
        let read = reader.read_to_end(usize::MAX).await.unwrap();
        assert_eq!(read, payload);
    }

    #[tokio::test]
    async fn test_reader_empty_payload() {
        let reader = CacheReader::from_bytes(key(), Bytes::new());
        assert!(reader.read_to_end(16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_enforces_limit() {
        let reader = CacheReader::from_bytes(key(), Bytes::from_static(b"http://b/y"));
        let result = reader.read_to_end(4).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_reader_propagates_chunk_error() {
        let body = stream::iter(vec![Ok(Bytes::from_static(b"ab")), Err(Error::Store("io".into()))]).boxed();
        let reader = CacheReader::new(key(), body);
        assert!(reader.read_to_end(1024).await.is_err());
    }
}
