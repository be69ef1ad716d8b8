//! Error types for the HTTP transport.

use crate::device::DeviceHandle;
use iothub_message::MessageError;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure reported by an [`HttpClient`](crate::HttpClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("http error: {message}")]
pub struct HttpError {
    /// Error message.
    pub message: String,
    /// Whether the request can be retried.
    pub retryable: bool,
}

impl HttpError {
    /// Creates a retryable HTTP error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable HTTP error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Errors that can occur in the HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A device with this ID is already registered.
    #[error("device already registered: {0}")]
    DeviceAlreadyRegistered(String),

    /// The device handle is not registered with this transport.
    #[error("device not registered: {0}")]
    DeviceNotFound(DeviceHandle),

    /// The device credential could not be used.
    #[error("credential error: {0}")]
    Credential(String),

    /// A header name or value cannot be sent.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Why the header was refused.
        reason: &'static str,
    },

    /// The message can never fit in a request.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge {
        /// Accounted message size.
        size: usize,
        /// Request ceiling.
        limit: usize,
    },

    /// The message carries no disposition token.
    #[error("message has no disposition token")]
    MissingDispositionToken,

    /// The HTTP client failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The hub answered with an unexpected status.
    #[error("unexpected http status {0}")]
    UnexpectedStatus(u16),

    /// The wall clock could not be read.
    #[error("wall clock unavailable")]
    ClockUnavailable,

    /// Message encoding error.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// The option is not known to the transport or its HTTP client.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// The option value has the wrong type.
    #[error("invalid value for option {0}")]
    InvalidOptionValue(String),

    /// The feature is not available over HTTP.
    #[error("{0} is not supported by the http transport")]
    Unsupported(&'static str),
}

impl TransportError {
    /// Returns true if this error can be retried on a later call.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Http(err) => err.retryable,
            TransportError::UnexpectedStatus(status) => *status >= 500 || *status == 429,
            TransportError::ClockUnavailable => true,
            _ => false,
        }
    }

    /// Returns true if the message that caused this error must not be retried.
    pub fn is_fatal_for_message(&self) -> bool {
        matches!(
            self,
            TransportError::MessageTooLarge { .. }
                | TransportError::InvalidHeader { .. }
                | TransportError::Message(_)
        )
    }
}
