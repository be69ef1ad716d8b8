//! Cloud-to-device delivery and disposition.

use crate::error::{MessageError, MessageResult};
use crate::message::Message;
use std::fmt;

/// Outcome a device reports for a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionResult {
    /// The message was consumed and is removed from the hub.
    Accepted,
    /// The message is discarded and not redelivered.
    Rejected,
    /// The message goes back to the hub queue for redelivery.
    Abandoned,
}

impl fmt::Display for DispositionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispositionResult::Accepted => "accepted",
            DispositionResult::Rejected => "rejected",
            DispositionResult::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// The unquoted entity tag of a delivered message.
///
/// A token is required to accept, reject or abandon the message it came
/// with. It is not `Clone`: each delivery can be disposed at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct DispositionToken {
    value: String,
}

impl DispositionToken {
    /// Parses a raw `ETag` header value.
    ///
    /// The value must be at least two characters long and start and end
    /// with a double quote.
    pub fn from_etag(raw: &str) -> MessageResult<Self> {
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(|| MessageError::MalformedEntityTag(raw.to_string()))?;
        Ok(Self {
            value: unquoted.to_string(),
        })
    }

    /// Returns the unquoted tag.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the quoted tag, as sent in `If-Match`.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.value)
    }
}

/// A cloud-to-device message together with its disposition token.
#[derive(Debug)]
pub struct ReceivedMessage {
    message: Message,
    token: Option<DispositionToken>,
}

impl ReceivedMessage {
    /// Wraps a message that carries no disposition token.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            token: None,
        }
    }

    /// Wraps a message with its disposition token.
    pub fn with_token(message: Message, token: DispositionToken) -> Self {
        Self {
            message,
            token: Some(token),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the disposition token, if any.
    pub fn token(&self) -> Option<&DispositionToken> {
        self.token.as_ref()
    }

    /// Removes and returns the disposition token.
    pub fn take_token(&mut self) -> Option<DispositionToken> {
        self.token.take()
    }

    /// Unwraps the message, dropping the token.
    pub fn into_message(self) -> Message {
        self.message
    }
}
