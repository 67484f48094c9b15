//! The dedup filter and its two transaction hooks.
//!
//! - `on_read_response_headers` runs when origin response headers arrive and
//!   hands back a [`DigestTransform`] for the body.
//! - `on_send_response_headers` runs just before headers go to the client and
//!   may rewrite `Location` to a cached duplicate.
//!
//! Both hooks are fail-open: anything unexpected leaves the response as it was.

use std::sync::Arc;

use metadup_core::{AppConfig, CacheStore};
use tracing::{debug, info, warn};

use crate::context::{ResponseContext, ScanOptions};
use crate::fallback::scan_duplicates;
use crate::header::ClientResponse;
use crate::index::DigestIndexWriter;
use crate::outcome::{Outcome, PassReason, Via};
use crate::resolve::{Resolution, resolve};
use crate::transform::DigestTransform;

/// Feature switches for one filter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Record digest index entries for completed bodies.
    pub digest_index: bool,
    /// Rewrite using `Digest:` headers and the digest index.
    pub digest_resolution: bool,
    /// Rewrite using `Link: rel=duplicate` headers.
    pub link_fallback: bool,
    pub max_index_entry_bytes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { digest_index: true, digest_resolution: true, link_fallback: true, max_index_entry_bytes: 8192 }
    }
}

impl From<&AppConfig> for FilterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            digest_index: config.digest_index,
            digest_resolution: config.digest_resolution,
            link_fallback: config.link_fallback,
            max_index_entry_bytes: config.max_index_entry_bytes,
        }
    }
}

impl FilterConfig {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions { digests: self.digest_resolution, links: self.link_fallback }
    }
}

/// Metalink dedup filter bound to one cache store.
#[derive(Clone)]
pub struct DedupFilter {
    store: Arc<dyn CacheStore>,
    config: FilterConfig,
}

impl DedupFilter {
    pub fn new(store: Arc<dyn CacheStore>, config: FilterConfig) -> Self {
        Self { store, config }
    }

    /// Origin response headers are in: attach a digest transform to the body.
    pub fn on_read_response_headers(&self, request_url: &str) -> DigestTransform {
        let index = self.config.digest_index.then(|| DigestIndexWriter::new(Arc::clone(&self.store)));
        debug!(url = request_url, indexed = index.is_some(), "attaching digest transform");
        DigestTransform::new(request_url, index)
    }

    /// Client response headers are about to be sent: rewrite `Location` if a
    /// cached duplicate of its target exists.
    pub async fn on_send_response_headers<R>(&self, response: &mut R) -> Outcome
    where
        R: ClientResponse + ?Sized,
    {
        let outcome = self.decide(response).await;
        match &outcome {
            Outcome::Rewritten { from, to, via } => {
                info!(from = %from, to = %to, via = via.as_str(), "Location rewritten to cached duplicate")
            }
            Outcome::PassThrough(reason) => debug!(reason = reason.as_str(), "response passed through"),
        }
        outcome
    }

    async fn decide<R>(&self, response: &mut R) -> Outcome
    where
        R: ClientResponse + ?Sized,
    {
        let headers = match response.headers_mut() {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "client response headers unavailable");
                return Outcome::PassThrough(PassReason::HeaderRetrievalFailed);
            }
        };

        let mut ctx = match ResponseContext::open(self.store.as_ref(), headers, self.config.scan_options()) {
            Ok(ctx) => ctx,
            Err(reason) => return Outcome::PassThrough(reason),
        };
        let from = ctx.location().to_string();

        let (to, via) = match resolve(&mut ctx, self.config.max_index_entry_bytes).await {
            Resolution::Unchanged(reason) => return Outcome::PassThrough(reason),
            Resolution::Rewrite(entry) => (entry.stored, Via::DigestIndex),
            Resolution::NoQualifyingDigest => match scan_duplicates(&mut ctx).await {
                Some(target) => (target, Via::LinkDuplicate),
                None => return Outcome::PassThrough(PassReason::LinksExhausted),
            },
        };

        match ctx.rewrite_location(&to) {
            Ok(()) => Outcome::Rewritten { from, to, via },
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "rewrite target rejected");
                Outcome::PassThrough(PassReason::InvalidRewrite)
            }
        }
    }
}

impl std::fmt::Debug for DedupFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupFilter").field("config", &self.config).finish_non_exhaustive()
    }
}
