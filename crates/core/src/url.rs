//! URL canonicalization for cache key derivation.
//!
//! Two URLs that differ only in host case, surrounding whitespace, or
//! fragment address the same cached object.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("relative URL: {0}")]
    Relative(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string into the form its cache key is computed over.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an absolute `http` or `https` URL with a host
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match url::Url::parse(trimmed) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => return Err(UrlError::Relative(trimmed.to_string())),
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let Some(host) = parsed.host_str() else {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    };

    let host = host.to_lowercase();
    parsed
        .set_host(Some(&host))
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("http://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com/a#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?b=2&a=1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  http://a/x  ").unwrap();
        assert_eq!(url.as_str(), "http://a/x");
    }

    #[test]
    fn test_canonicalize_relative() {
        let result = canonicalize("/download/file.iso");
        assert!(matches!(result, Err(UrlError::Relative(_))));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("ftp://mirror.example.org/file.iso");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_garbage() {
        let result = canonicalize("http://[::1");
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }
}
