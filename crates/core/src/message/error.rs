//! Error types for the message module.

use thiserror::Error;

/// Errors raised while decoding or interpreting messages.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The raw string does not start with the protocol magic.
    #[error("Not a pytroll message: {0}")]
    BadMagic(String),

    /// A header field is missing.
    #[error("Message header is truncated, missing {field}")]
    MissingHeader { field: &'static str },

    /// The header timestamp cannot be parsed.
    #[error("Invalid message time: {0}")]
    InvalidTime(String),

    /// The payload mime type is not supported.
    #[error("Unsupported payload type: {0}")]
    UnsupportedMime(String),

    /// The JSON payload is malformed.
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// A required data field is absent or has the wrong type.
    #[error("Message is lacking field: {field}")]
    MissingField { field: &'static str },
}
