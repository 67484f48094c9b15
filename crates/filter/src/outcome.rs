//! Terminal decisions of the send-response hook.

use std::fmt;

/// Why a response left the filter with its headers untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// The host could not provide the client response headers.
    HeaderRetrievalFailed,
    NoLocation,
    /// `Location` did not parse as an absolute http(s) URL.
    MalformedLocation,
    /// Neither a usable `Digest:` value nor a `rel=duplicate` link.
    NoCandidates,
    /// The `Location` target is already cached under its own URL.
    LocationCached,
    /// A cache read failed with something other than a miss.
    StoreUnavailable,
    /// No index entry for the response's content digest.
    IndexMiss,
    /// The index entry could not be read or parsed.
    CorruptIndexEntry,
    /// The indexed URL is no longer cached.
    TargetNotCached,
    /// Every duplicate link missed.
    LinksExhausted,
    /// The rewrite target is not a valid header value.
    InvalidRewrite,
}

impl PassReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PassReason::HeaderRetrievalFailed => "header_retrieval_failed",
            PassReason::NoLocation => "no_location",
            PassReason::MalformedLocation => "malformed_location",
            PassReason::NoCandidates => "no_candidates",
            PassReason::LocationCached => "location_cached",
            PassReason::StoreUnavailable => "store_unavailable",
            PassReason::IndexMiss => "index_miss",
            PassReason::CorruptIndexEntry => "corrupt_index_entry",
            PassReason::TargetNotCached => "target_not_cached",
            PassReason::LinksExhausted => "links_exhausted",
            PassReason::InvalidRewrite => "invalid_rewrite",
        }
    }
}

impl fmt::Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which mechanism found the duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    DigestIndex,
    LinkDuplicate,
}

impl Via {
    pub fn as_str(self) -> &'static str {
        match self {
            Via::DigestIndex => "digest_index",
            Via::LinkDuplicate => "link_duplicate",
        }
    }
}

/// The single terminal outcome of one send-response hook run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    PassThrough(PassReason),
    Rewritten { from: String, to: String, via: Via },
}

impl Outcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Outcome::Rewritten { .. })
    }

    /// New `Location` value, if the response was rewritten.
    pub fn rewritten_to(&self) -> Option<&str> {
        match self {
            Outcome::Rewritten { to, .. } => Some(to),
            Outcome::PassThrough(_) => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::PassThrough(reason) => write!(f, "pass_through({reason})"),
            Outcome::Rewritten { from, to, via } => write!(f, "rewritten({} {from} -> {to})", via.as_str()),
        }
    }
}
