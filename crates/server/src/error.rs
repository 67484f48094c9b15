//! Structured errors for the metadup harness.
//!
//! A bad input line never stops the harness: it is answered with an error
//! object carrying one of these codes.

use serde::Serialize;

/// Structured errors for one transaction line.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The line is not a valid transaction object.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A header name or value cannot be represented in an HTTP header map.
    #[error("INVALID_HEADER: {0}")]
    InvalidHeader(String),

    /// `body_base64` did not decode.
    #[error("INVALID_BODY: {0}")]
    InvalidBody(String),
}

impl DriverError {
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::InvalidInput(_) => "INVALID_INPUT",
            DriverError::InvalidHeader(_) => "INVALID_HEADER",
            DriverError::InvalidBody(_) => "INVALID_BODY",
        }
    }
}

/// Wire form of a [`DriverError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReply {
    pub code: &'static str,
    pub message: String,
}

impl From<&DriverError> for ErrorReply {
    fn from(err: &DriverError) -> Self {
        Self { code: err.code(), message: err.to_string() }
    }
}
