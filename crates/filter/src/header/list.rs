//! Comma-separated header list splitting (RFC 7230 `#rule`).
//!
//! Commas inside quoted strings and inside a leading `<...>` URI reference do
//! not separate elements. A `<` anywhere else is plain text, since parameter
//! tokens may contain it. Empty elements are dropped.

use std::borrow::Cow;

/// Split one header field value into its list elements, trimmed.
pub fn split_elements(field: &str) -> Vec<&str> {
    let mut elements = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    let mut at_element_start = true;

    for (i, c) in field.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' if !in_brackets => in_quotes = !in_quotes,
            '<' if at_element_start => in_brackets = true,
            '>' if in_brackets => in_brackets = false,
            ',' if !in_quotes && !in_brackets => {
                push_trimmed(&mut elements, &field[start..i]);
                start = i + 1;
                at_element_start = true;
                continue;
            }
            _ => {}
        }
        if !c.is_whitespace() {
            at_element_start = false;
        }
    }
    push_trimmed(&mut elements, &field[start..]);

    elements
}

fn push_trimmed<'a>(elements: &mut Vec<&'a str>, element: &'a str) {
    let element = element.trim();
    if !element.is_empty() {
        elements.push(element);
    }
}

/// Parse a quoted-string at the start of `input`.
///
/// Returns the unescaped content and the remainder after the closing quote,
/// or `None` if `input` does not start with a terminated quoted-string.
pub fn take_quoted(input: &str) -> Option<(Cow<'_, str>, &str)> {
    let body = input.strip_prefix('"')?;
    let mut owned: Option<String> = None;
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                let content = match owned {
                    Some(s) => Cow::Owned(s),
                    None => Cow::Borrowed(&body[..i]),
                };
                return Some((content, &body[i + 1..]));
            }
            '\\' => {
                let (_, escaped) = chars.next()?;
                owned.get_or_insert_with(|| body[..i].to_string()).push(escaped);
            }
            _ => {
                if let Some(s) = owned.as_mut() {
                    s.push(c);
                }
            }
        }
    }

    None
}
