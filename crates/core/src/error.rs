//! Unified error types for metadup.
//!
//! None of these ever reach a client. Protocol steps catch them where they
//! are detected and turn them into a pass-through outcome.

use tokio_rusqlite::rusqlite;

/// Unified error types for the dedup filter and its cache stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Location`, Link target, or stored index URL could not be parsed.
    #[error("MALFORMED_URL: {0}")]
    MalformedUrl(String),

    /// A decoded instance digest was not exactly 32 bytes.
    #[error("INVALID_DIGEST_LENGTH: expected 32 bytes, got {0}")]
    InvalidDigestLength(usize),

    /// A cache key could not be derived from its input.
    #[error("CACHE_KEY_DERIVATION_FAILED: {0}")]
    CacheKeyDerivationFailed(String),

    /// No cache object stored under the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The host could not hand over the client response headers.
    #[error("HEADER_RETRIEVAL_FAILED: {0}")]
    HeaderRetrievalFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A cache store operation failed for a reason other than a miss.
    #[error("CACHE_ERROR: {0}")]
    Store(String),
}

impl Error {
    /// Whether the error only means "nothing usable is cached here".
    ///
    /// Key derivation failures count as misses so the protocol can move on
    /// to its next candidate.
    pub fn is_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_) | Error::CacheKeyDerivationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<crate::url::UrlError> for Error {
    fn from(err: crate::url::UrlError) -> Self {
        Error::MalformedUrl(err.to_string())
    }
}
