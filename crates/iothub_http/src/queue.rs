//! Per-device outgoing message queue.

use iothub_message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A queued device-to-cloud message and the caller's tag for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    id: u64,
    message: Message,
}

impl OutgoingMessage {
    /// Wraps a message with a caller-chosen tag.
    pub fn new(id: u64, message: Message) -> Self {
        Self { id, message }
    }

    /// Returns the caller's tag.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Unwraps the message.
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// Shared FIFO handle to a device's outgoing messages.
///
/// Clones share the same queue. The client core pushes to the back between
/// work cycles; the transport removes messages from the front only once
/// their outcome is final.
#[derive(Debug, Clone, Default)]
pub struct OutgoingQueue {
    inner: Arc<Mutex<VecDeque<OutgoingMessage>>>,
}

impl OutgoingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a message.
    pub fn push_back(&self, message: OutgoingMessage) {
        self.inner.lock().push_back(message);
    }

    /// Returns the number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Removes the head message.
    pub fn pop_front(&self) -> Option<OutgoingMessage> {
        self.inner.lock().pop_front()
    }

    /// Puts a message back at the head.
    pub fn push_front(&self, message: OutgoingMessage) {
        self.inner.lock().push_front(message);
    }

    /// Puts messages back at the head, keeping their order.
    pub fn restore_front(&self, messages: Vec<OutgoingMessage>) {
        let mut queue = self.inner.lock();
        for message in messages.into_iter().rev() {
            queue.push_front(message);
        }
    }

    /// Runs `f` on the head message without removing it.
    pub fn with_front<R>(&self, f: impl FnOnce(&OutgoingMessage) -> R) -> Option<R> {
        self.inner.lock().front().map(f)
    }

    /// Returns the tags of all queued messages, head first.
    pub fn ids(&self) -> Vec<u64> {
        self.inner.lock().iter().map(OutgoingMessage::id).collect()
    }
}
