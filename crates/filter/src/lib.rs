//! Metalink dedup filter for a caching forward proxy.
//!
//! When an origin redirects to a mirror that is not cached, but the same
//! content is already cached under another URL, the filter rewrites the
//! redirect's `Location` to that URL so the client is served from cache.
//!
//! Two signals identify duplicates:
//! - RFC 3230 `Digest: SHA-256=...` looked up in a digest index that this
//!   filter builds by hashing every completed response body
//! - RFC 6249 `Link: <...>; rel=duplicate` mirror links, checked in order

pub mod context;
pub mod fallback;
pub mod header;
pub mod index;
pub mod outcome;
pub mod plugin;
pub mod resolve;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use context::{Lookup, ResponseContext, ScanOptions};
pub use header::ClientResponse;
pub use index::{DigestIndexWriter, IndexEntry};
pub use outcome::{Outcome, PassReason, Via};
pub use plugin::{DedupFilter, FilterConfig};
pub use resolve::Resolution;
pub use transform::{DigestTransform, TransformReport, TransformState};
