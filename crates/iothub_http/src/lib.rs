//! # IoT Hub HTTP Transport
//!
//! Send, poll and disposition engine for IoT Hub devices over plain HTTP.
//!
//! The transport owns a set of registered devices. Each call to
//! [`HttpTransport::do_work`] walks them in registration order and, for
//! every device:
//!
//! 1. sends the head of its outgoing queue, or a size-bounded JSON batch
//!    when batching is on;
//! 2. polls for one cloud-to-device message if the device is subscribed and
//!    the minimum polling interval has passed.
//!
//! Delivered messages carry a [`DispositionToken`](iothub_message::DispositionToken)
//! and are settled later with [`HttpTransport::send_message_disposition`].
//!
//! ## Collaborators
//!
//! Network, time and the client core are injected:
//!
//! - [`HttpClient`]: executes one request (`ReqwestClient` with the
//!   `reqwest` feature, [`MockHttpClient`] in tests)
//! - [`Clock`]: wall-clock time for polling and SAS expiry
//! - [`TransportCallbacks`]: completions and deliveries
//!
//! ## Example
//!
//! ```
//! use iothub_http::{
//!     DeviceConfig, HttpTransport, MockClock, MockHttpClient, OutgoingMessage,
//!     OutgoingQueue, RecordingCallbacks, TransportConfig,
//! };
//! use iothub_message::Message;
//! use std::time::SystemTime;
//!
//! let mut transport = HttpTransport::new(
//!     TransportConfig::new("hub", "azure-devices.net"),
//!     MockHttpClient::new(),
//!     MockClock::at(SystemTime::UNIX_EPOCH),
//!     RecordingCallbacks::new(),
//! )?;
//!
//! let queue = OutgoingQueue::new();
//! let config = DeviceConfig::new("dev1").with_sas_token("sas");
//! let device = transport.register(&config, queue.clone())?;
//! queue.push_back(OutgoingMessage::new(1, Message::from_text("hello")));
//!
//! transport.do_work();
//! assert_eq!(transport.callbacks().completions().len(), 1);
//! # let _ = device;
//! # Ok::<(), iothub_http::TransportError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod callbacks;
mod clock;
mod config;
mod device;
mod disposition;
mod error;
mod http;
mod inbound;
mod mock;
mod outbound;
mod queue;
mod sas;
mod transport;

pub use callbacks::{ConfirmationResult, Delivery, SendStatus, TransportCallbacks};
pub use clock::{Clock, SystemClock};
pub use config::{
    Credential, DeviceConfig, TransportConfig, API_VERSION, DEFAULT_MIN_POLLING_INTERVAL,
    DEFAULT_SAS_TOKEN_LIFETIME, OPTION_BATCHING, OPTION_MIN_POLLING_TIME,
};
pub use device::DeviceHandle;
pub use error::{HttpError, TransportError, TransportResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{
    url_encode, validate_header, HttpClient, HttpHeaders, HttpMethod, HttpRequest, HttpResponse,
    OptionValue, OPTION_HTTP_TIMEOUT,
};
pub use mock::{Completion, MockClock, MockHttpClient, RecordingCallbacks};
pub use queue::{OutgoingMessage, OutgoingQueue};
pub use sas::SasSigner;
pub use transport::{HttpTransport, TransportStats, DEFAULT_USER_AGENT};
