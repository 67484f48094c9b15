//! RFC 3230 `Digest` header parsing.
//!
//! ```text
//! Digest         = "Digest" ":" #(instance-digest)
//! instance-digest = digest-algorithm "=" <encoded digest output>
//! ```
//!
//! Only `SHA-256` is used for dedup. Its encoded output is base64 of the 32
//! raw digest bytes.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use metadup_core::{CacheKey, Error};

use super::list::split_elements;

/// Algorithm token for SHA-256 instance digests.
pub const SHA_256: &str = "SHA-256";

/// Standard alphabet, padding optional on decode.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One `instance-digest` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceDigest<'a> {
    pub algorithm: &'a str,
    pub encoded: &'a str,
}

impl<'a> InstanceDigest<'a> {
    /// Split `algorithm=encoded` at the first `=`; base64 padding may follow.
    pub fn parse(element: &'a str) -> Option<Self> {
        let (algorithm, encoded) = element.split_once('=')?;
        let algorithm = algorithm.trim();
        let encoded = encoded.trim();
        if algorithm.is_empty() || encoded.is_empty() {
            return None;
        }
        Some(Self { algorithm, encoded })
    }

    pub fn is_sha256(&self) -> bool {
        self.algorithm.eq_ignore_ascii_case(SHA_256)
    }

    /// Decode a SHA-256 instance digest into the key of its index entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheKeyDerivationFailed` if the payload is not base64
    /// and `Error::InvalidDigestLength` if it does not decode to 32 bytes.
    pub fn to_key(&self) -> Result<CacheKey, Error> {
        let raw = BASE64
            .decode(self.encoded)
            .map_err(|e| Error::CacheKeyDerivationFailed(format!("digest is not base64: {e}")))?;
        CacheKey::from_digest(&raw)
    }
}

/// Find the first structurally valid SHA-256 instance digest across all
/// `Digest:` occurrences and return the key of its index entry.
///
/// Invalid SHA-256 values are skipped. Once a valid one is found the scan
/// stops, whatever its later lookup yields.
pub fn sha256_index_key<'a, I>(fields: I) -> Option<CacheKey>
where
    I: IntoIterator<Item = &'a str>,
{
    fields
        .into_iter()
        .flat_map(split_elements)
        .filter_map(InstanceDigest::parse)
        .filter(InstanceDigest::is_sha256)
        .find_map(|digest| match digest.to_key() {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::debug!(encoded = digest.encoded, error = %e, "skipping unusable SHA-256 digest");
                None
            }
        })
}

/// Render a raw digest as a `Digest:` header value.
pub fn encode_sha256(digest: &[u8]) -> String {
    format!("{SHA_256}={}", base64::engine::general_purpose::STANDARD.encode(digest))
}
