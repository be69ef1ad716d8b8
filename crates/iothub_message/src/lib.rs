//! # IoT Hub Message
//!
//! Message model and wire helpers for the IoT Hub HTTP transport.
//!
//! This crate provides:
//! - `Message` with binary or text bodies, application and system properties
//! - Size accounting against the hub's per-request ceiling
//! - The JSON batch codec used for batched device-to-cloud sends
//! - `DispositionToken` and `ReceivedMessage` for cloud-to-device delivery
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod batch;
mod disposition;
mod error;
mod message;
mod size;

pub use batch::{encode_entry, BatchWriter, APP_PROPERTY_PREFIX};
pub use disposition::{DispositionResult, DispositionToken, ReceivedMessage};
pub use error::{MessageError, MessageResult};
pub use message::{Message, MessageBody, Properties};
pub use size::{
    accounted_size, fits, MAXIMUM_MESSAGE_SIZE, MAXIMUM_PAYLOAD_OVERHEAD,
    MAXIMUM_PROPERTY_OVERHEAD,
};
