//! Duplicate-link fallback (RFC 6249).
//!
//! Walks `Link: <...>; rel=duplicate` candidates in header order and then
//! value order, one cache read at a time, and stops at the first target that
//! is already cached. Unparseable targets and misses just move the scan on.

use metadup_core::CacheKey;
use metadup_core::url::canonicalize;
use tracing::{debug, warn};

use crate::context::{Lookup, ResponseContext};

/// Find the first cached duplicate. Returns the URL to put in `Location`.
pub async fn scan_duplicates(ctx: &mut ResponseContext<'_>) -> Option<String> {
    while let Some(candidate) = ctx.next_candidate() {
        let target = match canonicalize(&candidate.target) {
            Ok(url) => url,
            Err(e) => {
                debug!(target = %candidate.target, field = candidate.field, error = %e, "skipping duplicate link");
                continue;
            }
        };

        match ctx.lookup(CacheKey::from_canonical_url(&target)).await {
            Lookup::Hit(_) => {
                debug!(target = %target, field = candidate.field, value = candidate.value, "duplicate link cached");
                return Some(target.into());
            }
            Lookup::Miss => {
                debug!(target = %target, "duplicate link not cached");
            }
            Lookup::Failed(e) => {
                warn!(target = %target, error = %e, "duplicate link lookup failed");
            }
        }
    }
    None
}
