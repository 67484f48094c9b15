//! Per-transaction state of the send-response hook.
//!
//! A [`ResponseContext`] mutably borrows the response headers for as long as
//! the dedup decision takes and is consumed (or dropped) when the decision is
//! made, so nothing it holds outlives the transaction. Cache lookups take
//! `&mut self`, which keeps at most one lookup in flight per transaction.

use http::HeaderMap;
use http::header::LINK;
use metadup_core::url::canonicalize;
use metadup_core::{CacheKey, CacheReader, CacheStore, Error};
use tracing::trace;

use crate::header::{self, DIGEST, DuplicateCandidate, duplicate_candidates, sha256_index_key};
use crate::outcome::PassReason;

/// Which dedup inputs to collect from the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub digests: bool,
    pub links: bool,
}

/// Result of one cache lookup.
#[derive(Debug)]
pub enum Lookup {
    Hit(CacheReader),
    Miss,
    Failed(Error),
}

pub struct ResponseContext<'a> {
    store: &'a dyn CacheStore,
    headers: &'a mut HeaderMap,
    location: String,
    location_url: url::Url,
    digest_key: Option<CacheKey>,
    candidates: Vec<DuplicateCandidate>,
    scan: usize,
    lookups: u32,
}

impl<'a> ResponseContext<'a> {
    /// Collect `Location`, the first usable SHA-256 digest, and duplicate
    /// link candidates. No cache I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns the pass-through reason when there is nothing to decide.
    pub fn open(store: &'a dyn CacheStore, headers: &'a mut HeaderMap, scan: ScanOptions) -> Result<Self, PassReason> {
        let location = match header::location(headers) {
            None => return Err(PassReason::NoLocation),
            Some(Err(_)) => return Err(PassReason::MalformedLocation),
            Some(Ok(raw)) => raw.to_string(),
        };

        let location_url = canonicalize(&location).map_err(|e| {
            trace!(location = %location, error = %e, "unparseable Location");
            PassReason::MalformedLocation
        })?;

        let digest_key = if scan.digests { sha256_index_key(header::field_values(headers, &DIGEST)) } else { None };
        let candidates =
            if scan.links { duplicate_candidates(header::field_values(headers, &LINK)) } else { Vec::new() };

        if digest_key.is_none() && candidates.is_empty() {
            return Err(PassReason::NoCandidates);
        }

        Ok(Self { store, headers, location, location_url, digest_key, candidates, scan: 0, lookups: 0 })
    }

    /// `Location` as received.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn location_key(&self) -> CacheKey {
        CacheKey::from_canonical_url(&self.location_url)
    }

    /// Hand the digest index key to the step that looks it up.
    pub fn take_digest_key(&mut self) -> Option<CacheKey> {
        self.digest_key.take()
    }

    #[cfg(test)]
    pub(crate) fn has_digest(&self) -> bool {
        self.digest_key.is_some()
    }

    /// Next unscanned duplicate link candidate, advancing the scan index.
    pub fn next_candidate(&mut self) -> Option<DuplicateCandidate> {
        let candidate = self.candidates.get(self.scan).cloned();
        if candidate.is_some() {
            self.scan += 1;
        }
        candidate
    }

    #[cfg(test)]
    pub(crate) fn has_candidates(&self) -> bool {
        self.scan < self.candidates.len()
    }

    /// Number of cache lookups issued so far.
    pub fn lookups(&self) -> u32 {
        self.lookups
    }

    /// Open the object at `key`; the key is dropped when the read resolves.
    pub async fn lookup(&mut self, key: CacheKey) -> Lookup {
        self.lookups += 1;
        match self.store.open_read(&key).await {
            Ok(Some(reader)) => Lookup::Hit(reader),
            Ok(None) => Lookup::Miss,
            Err(e) if e.is_miss() => Lookup::Miss,
            Err(e) => Lookup::Failed(e),
        }
    }

    /// Replace `Location` with `target`, ending the context.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedUrl` if `target` is not a valid header value;
    /// the headers are unchanged in that case.
    pub fn rewrite_location(self, target: &str) -> Result<(), Error> {
        header::set_location(self.headers, target)
    }
}

impl std::fmt::Debug for ResponseContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseContext")
            .field("location", &self.location)
            .field("digest_key", &self.digest_key)
            .field("candidates", &self.candidates.len())
            .field("scan", &self.scan)
            .field("lookups", &self.lookups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::LOCATION;
    use metadup_core::MemoryStore;

    const ALL: ScanOptions = ScanOptions { digests: true, links: true };

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(http::HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_open_without_location() {
        let store = MemoryStore::new();
        let mut map = headers(&[("link", "<http://b/y>; rel=duplicate")]);
        assert_eq!(ResponseContext::open(&store, &mut map, ALL).unwrap_err(), PassReason::NoLocation);
    }

    #[test]
    fn test_open_malformed_location() {
        let store = MemoryStore::new();
        let mut map = headers(&[("location", "::not a url::"), ("link", "<http://b/y>; rel=duplicate")]);
        assert_eq!(ResponseContext::open(&store, &mut map, ALL).unwrap_err(), PassReason::MalformedLocation);
    }

    #[test]
    fn test_open_without_candidates() {
        let store = MemoryStore::new();
        let mut map = headers(&[("location", "http://a/x"), ("link", "<http://b/y>; rel=alternate")]);
        assert_eq!(ResponseContext::open(&store, &mut map, ALL).unwrap_err(), PassReason::NoCandidates);
    }

    #[test]
    fn test_open_respects_scan_options() {
        let store = MemoryStore::new();
        let mut map = headers(&[("location", "http://a/x"), ("link", "<http://b/y>; rel=duplicate")]);
        let links_off = ScanOptions { digests: true, links: false };
        assert_eq!(ResponseContext::open(&store, &mut map, links_off).unwrap_err(), PassReason::NoCandidates);
    }

    #[test]
    fn test_candidate_scan_advances() {
        let store = MemoryStore::new();
        let mut map = headers(&[
            ("location", "http://a/x"),
            ("link", "<http://b/1>; rel=duplicate"),
            ("link", "<http://b/2>; rel=duplicate"),
        ]);
        let mut ctx = ResponseContext::open(&store, &mut map, ALL).unwrap();
        assert!(!ctx.has_digest());
        assert_eq!(ctx.next_candidate().unwrap().target, "http://b/1");
        assert_eq!(ctx.next_candidate().unwrap().target, "http://b/2");
        assert!(ctx.next_candidate().is_none());
        assert!(!ctx.has_candidates());
    }

    #[tokio::test]
    async fn test_lookup_counts_and_resolves() {
        let store = MemoryStore::new();
        store.insert(CacheKey::from_url("http://a/x").unwrap(), "body").await;
        let mut map = headers(&[("location", "http://A/x#top"), ("link", "<http://b/y>; rel=duplicate")]);
        let mut ctx = ResponseContext::open(&store, &mut map, ALL).unwrap();

        let key = ctx.location_key();
        assert!(matches!(ctx.lookup(key).await, Lookup::Hit(_)));
        let miss = CacheKey::from_url("http://b/y").unwrap();
        assert!(matches!(ctx.lookup(miss).await, Lookup::Miss));
        assert_eq!(ctx.lookups(), 2);
    }

    #[test]
    fn test_rewrite_location() {
        let store = MemoryStore::new();
        let mut map = headers(&[("location", "http://a/x"), ("link", "<http://b/y>; rel=duplicate")]);
        let ctx = ResponseContext::open(&store, &mut map, ALL).unwrap();
        assert_eq!(ctx.location(), "http://a/x");
        ctx.rewrite_location("http://b/y").unwrap();
        assert_eq!(map.get(LOCATION).unwrap(), "http://b/y");
    }
}
