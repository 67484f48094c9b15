//! Digest index: content digest -> canonical URL first stored with it.
//!
//! An index entry lives in the cache under the raw SHA-256 of a body and its
//! payload is the canonical request URL. Entries are replaced wholesale on
//! each write and expire whenever the cache store decides.

use std::sync::Arc;

use metadup_core::url::canonicalize;
use metadup_core::{CacheKey, CacheStore, Error};
use tracing::{debug, warn};

/// Decoded payload of an index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Payload exactly as stored; this is what `Location` is rewritten to.
    pub stored: String,
    /// Canonical form of `stored`, used to derive its cache key.
    pub canonical: url::Url,
}

impl IndexEntry {
    /// Build the entry recorded for a completed response to `request_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedUrl` if the request URL cannot be canonicalized.
    pub fn for_request(request_url: &str) -> Result<Self, Error> {
        let canonical = canonicalize(request_url)?;
        Ok(Self { stored: canonical.to_string(), canonical })
    }

    /// Decode a stored payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedUrl` for payloads that are not UTF-8 or do not
    /// parse as an absolute http(s) URL.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let stored = std::str::from_utf8(payload)
            .map_err(|e| Error::MalformedUrl(format!("index entry is not UTF-8: {e}")))?;
        let canonical = canonicalize(stored)?;
        Ok(Self { stored: stored.to_string(), canonical })
    }

    pub fn payload(&self) -> &[u8] {
        self.stored.as_bytes()
    }

    /// Key of the object this entry points at.
    pub fn target_key(&self) -> CacheKey {
        CacheKey::from_canonical_url(&self.canonical)
    }
}

/// Writes one index entry per completed body. Best-effort: failures are
/// logged and swallowed, and there is no retry.
#[derive(Clone)]
pub struct DigestIndexWriter {
    store: Arc<dyn CacheStore>,
}

impl DigestIndexWriter {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Record `digest -> request_url`. Returns whether the entry was committed.
    pub async fn write(&self, digest: &[u8], request_url: &str) -> bool {
        let key = match CacheKey::from_digest(digest) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "digest index write skipped");
                return false;
            }
        };

        let entry = match IndexEntry::for_request(request_url) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "request URL not indexable");
                return false;
            }
        };

        let mut writer = match self.store.open_write(&key).await {
            Ok(writer) => writer,
            Err(e) => {
                warn!(key = %key, error = %e, "could not open digest index entry for writing");
                return false;
            }
        };

        if let Err(e) = writer.write(entry.payload()).await {
            warn!(key = %key, error = %e, "digest index payload write failed");
            return false;
        }

        match writer.commit().await {
            Ok(()) => {
                debug!(key = %key, url = %entry.stored, "digest index entry recorded");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "digest index commit failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for DigestIndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestIndexWriter").finish_non_exhaustive()
    }
}
