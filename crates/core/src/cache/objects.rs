//! Object reads and writes for the SQLite store.
//!
//! A write handle buffers its bytes in memory; commit publishes them with a
//! single UPSERT, so readers see either the previous object or the new one.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::SqliteStore;
use super::key::CacheKey;
use super::store::{CacheReader, CacheStore, CacheWrite};
use crate::Error;

impl SqliteStore {
    /// Insert or replace the object at `key`.
    pub async fn put_object(&self, key: &CacheKey, body: Bytes) -> Result<(), Error> {
        let key = key.as_bytes().to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO objects (key, body, stored_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![key, body.to_vec(), stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the object body at `key`.
    ///
    /// Returns None if nothing is stored there.
    pub async fn get_object(&self, key: &CacheKey) -> Result<Option<Bytes>, Error> {
        let key = key.as_bytes().to_vec();
        self.conn
            .call(move |conn| -> Result<Option<Bytes>, Error> {
                let mut stmt = conn.prepare("SELECT body FROM objects WHERE key = ?1")?;
                let result = stmt.query_row(params![key], |row| row.get::<_, Vec<u8>>(0));

                match result {
                    Ok(body) => Ok(Some(Bytes::from(body))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the object at `key`, returning whether a row was removed.
    pub async fn delete_object(&self, key: &CacheKey) -> Result<bool, Error> {
        let key = key.as_bytes().to_vec();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM objects WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of committed objects.
    pub async fn count_objects(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn open_read(&self, key: &CacheKey) -> Result<Option<CacheReader>, Error> {
        Ok(self
            .get_object(key)
            .await?
            .map(|body| CacheReader::from_bytes(key.clone(), body)))
    }

    async fn open_write(&self, key: &CacheKey) -> Result<Box<dyn CacheWrite>, Error> {
        Ok(Box::new(SqliteWrite { key: key.clone(), buf: BytesMut::new(), store: self.clone() }))
    }

    async fn evict(&self, key: &CacheKey) -> Result<bool, Error> {
        self.delete_object(key).await
    }
}

struct SqliteWrite {
    key: CacheKey,
    buf: BytesMut,
    store: SqliteStore,
}

#[async_trait]
impl CacheWrite for SqliteWrite {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let SqliteWrite { key, buf, store } = *self;
        store.put_object(&key, buf.freeze()).await
    }
}
