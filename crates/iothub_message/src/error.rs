//! Error types for the message crate.

use thiserror::Error;

/// Result type for message operations.
pub type MessageResult<T> = Result<T, MessageError>;

/// Errors that can occur while encoding or decoding messages.
#[derive(Error, Debug)]
pub enum MessageError {
    /// JSON encoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The entity tag is not a quoted string.
    #[error("malformed entity tag: {0:?}")]
    MalformedEntityTag(String),
}
