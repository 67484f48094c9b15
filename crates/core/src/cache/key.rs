//! Cache key derivation.
//!
//! Every cached object is addressed by a 32-byte [`CacheKey`]. URL keys are
//! SHA-256 over the canonical URL; content keys are the raw SHA-256 of a body
//! used directly. URL keys are hashed under a domain tag, so a URL key and a
//! content key can only collide if SHA-256 does.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::Error;
use crate::url::canonicalize;

/// Length in bytes of every cache key and of a SHA-256 instance digest.
pub const KEY_LEN: usize = 32;

const URL_KEY_TAG: &[u8] = b"metadup:url\n";

/// Opaque identifier addressing one object in the cache store.
///
/// Not `Copy`: a key is owned by the protocol step that derived
/// it and is dropped when that step ends.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; KEY_LEN]);

impl CacheKey {
    /// Derive the key of the object cached for `url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedUrl` if the URL cannot be canonicalized.
    pub fn from_url(url: &str) -> Result<Self, Error> {
        let canonical = canonicalize(url)?;
        Ok(Self::from_canonical_url(&canonical))
    }

    /// Derive the key of an already canonical URL.
    pub fn from_canonical_url(url: &url::Url) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(URL_KEY_TAG);
        hasher.update(url.as_str().as_bytes());
        Self(hasher.finalize().into())
    }

    /// Use a raw content digest as a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDigestLength` unless `digest` is exactly 32 bytes.
    pub fn from_digest(digest: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; KEY_LEN] = digest.try_into().map_err(|_| Error::InvalidDigestLength(digest.len()))?;
        Ok(Self(bytes))
    }

    /// Raw key bytes, as persisted by the store.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex form, used in logs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_key_stability() {
        let key1 = CacheKey::from_url("http://a/x").unwrap();
        let key2 = CacheKey::from_url("http://a/x").unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_url_key_canonical_equivalence() {
        let key1 = CacheKey::from_url("http://EXAMPLE.com/file#part").unwrap();
        let key2 = CacheKey::from_url(" http://example.com/file ").unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_url_key_differs_by_path() {
        let key1 = CacheKey::from_url("http://a/x").unwrap();
        let key2 = CacheKey::from_url("http://a/y").unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_url_key_malformed() {
        let result = CacheKey::from_url("not a url");
        assert!(matches!(result, Err(Error::MalformedUrl(_))));
    }

    #[test]
    fn test_digest_key_uses_bytes_directly() {
        let digest = [7u8; KEY_LEN];
        let key = CacheKey::from_digest(&digest).unwrap();
        assert_eq!(key.as_bytes(), &digest);
    }

    #[test]
    fn test_digest_key_rejects_wrong_length() {
        assert!(matches!(CacheKey::from_digest(&[0u8; 31]), Err(Error::InvalidDigestLength(31))));
        assert!(matches!(CacheKey::from_digest(&[0u8; 33]), Err(Error::InvalidDigestLength(33))));
        assert!(matches!(CacheKey::from_digest(&[]), Err(Error::InvalidDigestLength(0))));
    }

    #[test]
    fn test_url_key_is_not_plain_sha256_of_url() {
        let url = canonicalize("http://a/x").unwrap();
        let plain: [u8; KEY_LEN] = Sha256::digest(url.as_str().as_bytes()).into();
        let key = CacheKey::from_canonical_url(&url);
        assert_ne!(key.as_bytes(), &plain);
    }

    #[test]
    fn test_hex_format() {
        let key = CacheKey::from_url("https://example.com").unwrap();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(format!("{key}"), hex);
    }
}
