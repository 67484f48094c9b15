//! Response header access and header grammars.
//!
//! The host hands the filter its client response headers as an
//! [`http::HeaderMap`]. Repeated fields (several `Link:` lines) are kept as
//! separate occurrences and each occurrence may hold a comma-separated list.

pub mod digest;
pub mod link;
pub mod list;

use http::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use metadup_core::Error;

pub use digest::{InstanceDigest, encode_sha256, sha256_index_key};
pub use link::{DuplicateCandidate, LinkValue, duplicate_candidates};

/// RFC 3230 instance digest header.
pub static DIGEST: HeaderName = HeaderName::from_static("digest");

/// Access to the response headers about to be sent to the client.
pub trait ClientResponse: Send {
    /// Borrow the client response headers.
    ///
    /// # Errors
    ///
    /// Returns `Error::HeaderRetrievalFailed` if the host cannot provide them.
    fn headers_mut(&mut self) -> Result<&mut HeaderMap, Error>;
}

impl ClientResponse for HeaderMap {
    fn headers_mut(&mut self) -> Result<&mut HeaderMap, Error> {
        Ok(self)
    }
}

impl<T: Send> ClientResponse for http::Response<T> {
    fn headers_mut(&mut self) -> Result<&mut HeaderMap, Error> {
        Ok(http::Response::headers_mut(self))
    }
}

/// First `Location` value.
///
/// Returns `None` when the field is absent. A value that is not visible
/// ASCII cannot be a URL and is reported as malformed.
pub fn location(headers: &HeaderMap) -> Option<Result<&str, Error>> {
    headers.get(LOCATION).map(|value| {
        value
            .to_str()
            .map_err(|_| Error::MalformedUrl("Location is not visible ASCII".into()))
    })
}

/// All occurrences of `name` whose value is visible ASCII, in header order.
pub fn field_values<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Vec<&'h str> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect()
}

/// Replace every `Location` value with `target`.
///
/// # Errors
///
/// Returns `Error::MalformedUrl` if `target` is not a valid header value;
/// the headers are left untouched in that case.
pub fn set_location(headers: &mut HeaderMap, target: &str) -> Result<(), Error> {
    let value = HeaderValue::from_str(target).map_err(|e| Error::MalformedUrl(format!("{target:?}: {e}")))?;
    headers.insert(LOCATION, value);
    Ok(())
}
