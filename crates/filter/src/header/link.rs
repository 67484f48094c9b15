//! RFC 5988 `Link` header parsing and RFC 6249 duplicate candidates.
//!
//! ```text
//! Link       = "Link" ":" #link-value
//! link-value = "<" URI-Reference ">" *( ";" link-param )
//! link-param = "rel" "=" relation-types | token [ "=" ( token | quoted-string ) ]
//! relation-types = relation-type | <"> relation-type *( 1*SP relation-type ) <">
//! ```

use std::borrow::Cow;

use super::list::{split_elements, take_quoted};

/// Relation type advertising an alternate location of identical content.
pub const REL_DUPLICATE: &str = "duplicate";

/// Error type for malformed link-values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("link-value does not start with '<'")]
    MissingTarget,

    #[error("unterminated URI reference")]
    UnterminatedTarget,

    #[error("unterminated quoted-string in parameter {0}")]
    UnterminatedQuote(String),

    #[error("expected ';' before parameter, found {0:?}")]
    ExpectedSemicolon(char),

    #[error("empty parameter name")]
    EmptyParamName,
}

/// One `link-param` of a link-value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParam<'a> {
    pub name: &'a str,
    pub value: Option<Cow<'a, str>>,
}

/// A parsed link-value: target URI reference plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValue<'a> {
    pub target: &'a str,
    pub params: Vec<LinkParam<'a>>,
}

impl<'a> LinkValue<'a> {
    /// Parse one link-value.
    pub fn parse(input: &'a str) -> Result<Self, LinkError> {
        let input = input.trim();
        let rest = input.strip_prefix('<').ok_or(LinkError::MissingTarget)?;
        let end = rest.find('>').ok_or(LinkError::UnterminatedTarget)?;
        let target = rest[..end].trim();
        let mut rest = &rest[end + 1..];

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start();
            let Some(first) = rest.chars().next() else {
                break;
            };
            if first != ';' {
                return Err(LinkError::ExpectedSemicolon(first));
            }
            rest = rest[1..].trim_start();
            if rest.is_empty() {
                break;
            }

            let name_end = rest.find(|c: char| c == '=' || c == ';' || c.is_whitespace()).unwrap_or(rest.len());
            let name = &rest[..name_end];
            if name.is_empty() {
                return Err(LinkError::EmptyParamName);
            }
            rest = rest[name_end..].trim_start();

            let value = match rest.strip_prefix('=') {
                Some(after_eq) => {
                    let after_eq = after_eq.trim_start();
                    if after_eq.starts_with('"') {
                        let (value, after) =
                            take_quoted(after_eq).ok_or_else(|| LinkError::UnterminatedQuote(name.to_string()))?;
                        rest = after;
                        Some(value)
                    } else {
                        let value_end = after_eq.find(';').unwrap_or(after_eq.len());
                        rest = &after_eq[value_end..];
                        Some(Cow::Borrowed(after_eq[..value_end].trim_end()))
                    }
                }
                None => None,
            };

            params.push(LinkParam { name, value });
        }

        Ok(Self { target, params })
    }

    /// Value of the first parameter named `name`, compared case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }

    /// Relation types of the first `rel` parameter.
    ///
    /// Later `rel` parameters are ignored, as RFC 5988 requires.
    pub fn relation_types(&self) -> impl Iterator<Item = &str> {
        self.param("rel").into_iter().flat_map(|rel| rel.split_ascii_whitespace())
    }

    pub fn is_duplicate(&self) -> bool {
        self.relation_types().any(|rel| rel.eq_ignore_ascii_case(REL_DUPLICATE))
    }
}

/// A link-value that advertises a duplicate location.
///
/// `field` and `value` give its position: the n-th `Link:` occurrence and the
/// n-th value within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCandidate {
    pub target: String,
    pub field: usize,
    pub value: usize,
}

/// Collect duplicate candidates across all `Link:` occurrences, in header
/// order and then value order. Malformed link-values are skipped.
pub fn duplicate_candidates<'a, I>(fields: I) -> Vec<DuplicateCandidate>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates = Vec::new();
    for (field, raw) in fields.into_iter().enumerate() {
        for (value, element) in split_elements(raw).into_iter().enumerate() {
            match LinkValue::parse(element) {
                Ok(link) if link.is_duplicate() => {
                    candidates.push(DuplicateCandidate { target: link.target.to_string(), field, value });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(field, value, error = %e, "skipping malformed link-value");
                }
            }
        }
    }
    candidates
}
