//! Upcalls into the client core.

use crate::device::DeviceHandle;
use crate::queue::OutgoingMessage;
use iothub_message::{DispositionResult, ReceivedMessage};

/// Final outcome of one or more outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationResult {
    /// The hub accepted the messages.
    Confirmed,
    /// The messages can never be sent.
    Failed,
}

/// What the client core does with a delivered message.
#[derive(Debug)]
pub enum Delivery {
    /// The client core keeps the message and disposes it later through
    /// `HttpTransport::send_message_disposition`.
    Defer,
    /// Dispose the message immediately with the given outcome.
    ///
    /// The message must be the one just passed to
    /// [`TransportCallbacks::message_received`]. A message with any other
    /// token is dropped without a disposition request; settle older
    /// deliveries through `HttpTransport::send_message_disposition`.
    Settle(ReceivedMessage, DispositionResult),
}

/// Whether a device has messages waiting to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The outgoing queue is empty.
    Idle,
    /// The outgoing queue holds messages.
    Busy,
}

/// Callbacks the transport invokes during a work cycle.
///
/// The outgoing queue lock is never held while a callback runs.
pub trait TransportCallbacks {
    /// Reports the final outcome of messages removed from a device queue.
    fn send_complete(
        &mut self,
        device: DeviceHandle,
        messages: Vec<OutgoingMessage>,
        result: ConfirmationResult,
    );

    /// Hands a delivered cloud-to-device message to the client core.
    fn message_received(&mut self, device: DeviceHandle, message: ReceivedMessage) -> Delivery;

    /// Returns the product string sent as the user agent.
    fn product_info(&self) -> Option<String> {
        None
    }
}
