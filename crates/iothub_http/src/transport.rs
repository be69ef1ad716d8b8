//! The HTTP transport engine.

use crate::callbacks::{SendStatus, TransportCallbacks};
use crate::clock::Clock;
use crate::config::{DeviceConfig, TransportConfig, OPTION_BATCHING, OPTION_MIN_POLLING_TIME};
use crate::device::{DeviceHandle, DeviceRegistry};
use crate::disposition::dispose;
use crate::error::{TransportError, TransportResult};
use crate::http::{HttpClient, OptionValue};
use crate::queue::OutgoingQueue;
use crate::{inbound, outbound};
use iothub_message::{DispositionResult, ReceivedMessage};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// User agent sent when the client core supplies no product info.
pub const DEFAULT_USER_AGENT: &str = concat!("iothubclient/", env!("CARGO_PKG_VERSION"));

/// Counters kept across work cycles.
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Messages the hub accepted.
    pub messages_confirmed: u64,
    /// Messages dropped as unsendable.
    pub messages_failed: u64,
    /// Batched requests the hub accepted.
    pub batches_sent: u64,
    /// Completed poll exchanges.
    pub polls: u64,
    /// Cloud-to-device messages delivered to the client core.
    pub messages_received: u64,
    /// Disposition requests issued.
    pub dispositions: u64,
    /// Failed or rejected HTTP exchanges.
    pub errors: u64,
    /// Errors that retrying will not clear, a subset of `errors`.
    pub fatal_errors: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

impl TransportStats {
    /// Counts a failed exchange. Retryable errors log as warnings, the
    /// rest as errors.
    pub(crate) fn record_error(&mut self, context: &str, err: TransportError) {
        if err.is_retryable() {
            warn!("{} failed, will retry: {}", context, err);
        } else {
            error!("{} failed: {}", context, err);
            self.fatal_errors += 1;
        }
        self.errors += 1;
        self.last_error = Some(err.to_string());
    }
}

/// Moves device messages to and from an IoT hub over HTTP.
///
/// The transport does nothing on its own: every send, poll and settle
/// happens inside [`do_work`](Self::do_work) or
/// [`send_message_disposition`](Self::send_message_disposition), on the
/// caller's thread.
pub struct HttpTransport<C: HttpClient, K: Clock, B: TransportCallbacks> {
    config: TransportConfig,
    hostname: String,
    http: C,
    clock: K,
    callbacks: B,
    devices: DeviceRegistry,
    stats: TransportStats,
}

impl<C: HttpClient, K: Clock, B: TransportCallbacks> HttpTransport<C, K, B> {
    /// Creates a transport.
    pub fn new(config: TransportConfig, http: C, clock: K, callbacks: B) -> TransportResult<Self> {
        let hostname = config.hostname()?;
        info!("http transport for {}", hostname);
        Ok(Self {
            config,
            hostname,
            http,
            clock,
            callbacks,
            devices: DeviceRegistry::new(),
            stats: TransportStats::default(),
        })
    }

    /// Returns the host every request goes to.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the counters.
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Returns the HTTP client.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Returns the clock.
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Returns the callbacks.
    pub fn callbacks(&self) -> &B {
        &self.callbacks
    }

    /// Returns the callbacks mutably.
    pub fn callbacks_mut(&mut self) -> &mut B {
        &mut self.callbacks
    }

    /// Returns the number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Registers a device that sends from `queue`.
    pub fn register(
        &mut self,
        device: &DeviceConfig,
        queue: OutgoingQueue,
    ) -> TransportResult<DeviceHandle> {
        let user_agent = self
            .callbacks
            .product_info()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let handle = self.devices.register(
            device,
            queue,
            &self.config,
            &self.hostname,
            &user_agent,
        )?;
        info!("registered {} as {}", device.device_id, handle);
        Ok(handle)
    }

    /// Unregisters a device. Unknown handles are ignored.
    pub fn unregister(&mut self, handle: DeviceHandle) {
        match self.devices.remove(handle) {
            Some(device) => info!("unregistered {} ({})", device.device_id(), handle),
            None => warn!("unregister: {} is not registered", handle),
        }
    }

    /// Starts polling for cloud-to-device messages.
    pub fn subscribe(&mut self, handle: DeviceHandle) -> TransportResult<()> {
        let device = self
            .devices
            .get_mut(handle)
            .ok_or(TransportError::DeviceNotFound(handle))?;
        device.subscribed = true;
        debug!("{} subscribed", device.device_id());
        Ok(())
    }

    /// Stops polling. Unknown handles are ignored.
    pub fn unsubscribe(&mut self, handle: DeviceHandle) {
        match self.devices.get_mut(handle) {
            Some(device) => {
                device.subscribed = false;
                debug!("{} unsubscribed", device.device_id());
            }
            None => warn!("unsubscribe: {} is not registered", handle),
        }
    }

    /// Runs one send and one poll step for every device, in registration order.
    pub fn do_work(&mut self) {
        let Self {
            config,
            http,
            clock,
            callbacks,
            devices,
            stats,
            ..
        } = self;
        let (http, clock): (&C, &K) = (http, clock);
        for device in devices.iter_mut() {
            outbound::process(device, http, clock, callbacks, config.batching, stats);
            inbound::poll(
                device,
                http,
                clock,
                callbacks,
                config.min_polling_interval,
                stats,
            );
        }
    }

    /// Settles a message previously handed to the client core.
    pub fn send_message_disposition(
        &mut self,
        handle: DeviceHandle,
        message: ReceivedMessage,
        result: DispositionResult,
    ) -> TransportResult<()> {
        let device = self
            .devices
            .get(handle)
            .ok_or(TransportError::DeviceNotFound(handle))?;
        dispose(
            device,
            &self.http,
            &self.clock,
            message,
            result,
            &mut self.stats,
        )
    }

    /// Reports whether a device has messages waiting.
    pub fn send_status(&self, handle: DeviceHandle) -> TransportResult<SendStatus> {
        let device = self
            .devices
            .get(handle)
            .ok_or(TransportError::DeviceNotFound(handle))?;
        Ok(if device.queue().is_empty() {
            SendStatus::Idle
        } else {
            SendStatus::Busy
        })
    }

    /// Applies a runtime option.
    ///
    /// `Batching` and `MinimumPollingTime` are handled here and take effect
    /// on the next work cycle; anything else goes to the HTTP client.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> TransportResult<()> {
        match (name, &value) {
            (OPTION_BATCHING, OptionValue::Bool(batching)) => {
                self.config.batching = *batching;
            }
            (OPTION_MIN_POLLING_TIME, OptionValue::U64(seconds)) => {
                self.config.min_polling_interval = Duration::from_secs(*seconds);
            }
            (OPTION_BATCHING | OPTION_MIN_POLLING_TIME, _) => {
                return Err(TransportError::InvalidOptionValue(name.to_string()));
            }
            _ => return self.http.set_option(name, &value),
        }
        debug!("option {} set to {:?}", name, value);
        Ok(())
    }

    /// Device twin is not available over HTTP.
    pub fn subscribe_device_twin(&mut self, _handle: DeviceHandle) -> TransportResult<()> {
        Err(TransportError::Unsupported("device twin"))
    }

    /// Direct methods are not available over HTTP.
    pub fn subscribe_device_methods(&mut self, _handle: DeviceHandle) -> TransportResult<()> {
        Err(TransportError::Unsupported("direct methods"))
    }

    /// Module input queues are not available over HTTP.
    pub fn subscribe_input_queue(&mut self, _handle: DeviceHandle) -> TransportResult<()> {
        Err(TransportError::Unsupported("input queues"))
    }
}
