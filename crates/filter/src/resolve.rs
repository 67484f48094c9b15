//! Duplicate resolution by content digest.
//!
//! Steps, each one cache read, strictly in order:
//!
//! 1. `keyOf(Location)`: cached → nothing to do.
//! 2. `keyOf(SHA-256 digest)`: no index entry → nothing to do.
//! 3. Read and parse the index entry's URL.
//! 4. `keyOf(indexed URL)`: cached → rewrite `Location` to the indexed URL.
//!
//! When the response carries no usable digest, step 1 still runs and the
//! caller falls back to duplicate links.

use metadup_core::CacheKey;
use tracing::{debug, warn};

use crate::context::{Lookup, ResponseContext};
use crate::index::IndexEntry;
use crate::outcome::PassReason;

/// Result of digest resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Rewrite `Location` to the entry's stored URL.
    Rewrite(IndexEntry),
    Unchanged(PassReason),
    /// `Location` is not cached and there is no usable digest.
    NoQualifyingDigest,
}

enum Step {
    LookupLocation(CacheKey),
    LookupIndex(CacheKey),
    ReadEntry(metadup_core::CacheReader),
    ConfirmTarget(IndexEntry),
    Done(Resolution),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::LookupLocation(_) => "lookup_location",
            Step::LookupIndex(_) => "lookup_index",
            Step::ReadEntry(_) => "read_entry",
            Step::ConfirmTarget(_) => "confirm_target",
            Step::Done(_) => "done",
        }
    }
}

/// Run digest resolution for one response.
///
/// Index entries larger than `max_entry_bytes` are treated as corrupt.
pub async fn resolve(ctx: &mut ResponseContext<'_>, max_entry_bytes: usize) -> Resolution {
    let mut step = Step::LookupLocation(ctx.location_key());

    loop {
        debug!(location = ctx.location(), step = step.name(), "resolution step");
        step = match step {
            Step::LookupLocation(key) => match ctx.lookup(key).await {
                Lookup::Hit(_) => Step::Done(Resolution::Unchanged(PassReason::LocationCached)),
                Lookup::Failed(e) => {
                    warn!(location = ctx.location(), error = %e, "Location lookup failed");
                    Step::Done(Resolution::Unchanged(PassReason::StoreUnavailable))
                }
                Lookup::Miss => match ctx.take_digest_key() {
                    Some(digest_key) => Step::LookupIndex(digest_key),
                    None => Step::Done(Resolution::NoQualifyingDigest),
                },
            },
            Step::LookupIndex(key) => match ctx.lookup(key).await {
                Lookup::Hit(reader) => Step::ReadEntry(reader),
                Lookup::Miss => Step::Done(Resolution::Unchanged(PassReason::IndexMiss)),
                Lookup::Failed(e) => {
                    warn!(location = ctx.location(), error = %e, "digest index lookup failed");
                    Step::Done(Resolution::Unchanged(PassReason::StoreUnavailable))
                }
            },
            Step::ReadEntry(reader) => {
                let key = reader.key().clone();
                let decoded = reader
                    .read_to_end(max_entry_bytes)
                    .await
                    .and_then(|payload| IndexEntry::decode(&payload));
                match decoded {
                    Ok(entry) => Step::ConfirmTarget(entry),
                    Err(e) => {
                        warn!(key = %key, error = %e, "unusable digest index entry");
                        Step::Done(Resolution::Unchanged(PassReason::CorruptIndexEntry))
                    }
                }
            }
            Step::ConfirmTarget(entry) => match ctx.lookup(entry.target_key()).await {
                Lookup::Hit(_) => Step::Done(Resolution::Rewrite(entry)),
                Lookup::Miss => Step::Done(Resolution::Unchanged(PassReason::TargetNotCached)),
                Lookup::Failed(e) => {
                    warn!(target = %entry.stored, error = %e, "indexed URL lookup failed");
                    Step::Done(Resolution::Unchanged(PassReason::StoreUnavailable))
                }
            },
            Step::Done(resolution) => return resolution,
        };
    }
}
