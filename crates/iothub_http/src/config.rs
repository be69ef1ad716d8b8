//! Configuration for the HTTP transport.

use crate::error::{TransportError, TransportResult};
use std::time::Duration;

/// Service API version appended to every request path.
pub const API_VERSION: &str = "2016-11-14";

/// Default minimum time between two polls of the same device.
pub const DEFAULT_MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1500);

/// Default lifetime of generated SAS tokens.
pub const DEFAULT_SAS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Option name: batch outgoing messages into JSON arrays (`bool`).
pub const OPTION_BATCHING: &str = "Batching";

/// Option name: minimum polling interval in seconds (`u64`).
pub const OPTION_MIN_POLLING_TIME: &str = "MinimumPollingTime";

/// Configuration for an HTTP transport instance.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hub name (first label of the host name).
    pub iothub_name: String,
    /// Hub suffix (e.g. "azure-devices.net").
    pub iothub_suffix: String,
    /// Protocol gateway host; replaces `<name>.<suffix>` when set.
    pub protocol_gateway_hostname: Option<String>,
    /// Service API version.
    pub api_version: String,
    /// Whether outgoing messages are batched.
    pub batching: bool,
    /// Minimum time between two polls of the same device.
    pub min_polling_interval: Duration,
    /// Lifetime of generated SAS tokens.
    pub sas_token_lifetime: Duration,
}

impl TransportConfig {
    /// Creates a new transport configuration.
    pub fn new(iothub_name: impl Into<String>, iothub_suffix: impl Into<String>) -> Self {
        Self {
            iothub_name: iothub_name.into(),
            iothub_suffix: iothub_suffix.into(),
            protocol_gateway_hostname: None,
            api_version: API_VERSION.to_string(),
            batching: false,
            min_polling_interval: DEFAULT_MIN_POLLING_INTERVAL,
            sas_token_lifetime: DEFAULT_SAS_TOKEN_LIFETIME,
        }
    }

    /// Routes all requests through a protocol gateway.
    pub fn with_protocol_gateway(mut self, hostname: impl Into<String>) -> Self {
        self.protocol_gateway_hostname = Some(hostname.into());
        self
    }

    /// Enables or disables batching.
    pub fn with_batching(mut self, batching: bool) -> Self {
        self.batching = batching;
        self
    }

    /// Sets the minimum polling interval.
    pub fn with_min_polling_interval(mut self, interval: Duration) -> Self {
        self.min_polling_interval = interval;
        self
    }

    /// Sets the SAS token lifetime.
    pub fn with_sas_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.sas_token_lifetime = lifetime;
        self
    }

    /// Resolves the host every request goes to.
    pub fn hostname(&self) -> TransportResult<String> {
        if let Some(gateway) = &self.protocol_gateway_hostname {
            if gateway.is_empty() {
                return Err(TransportError::InvalidArgument(
                    "protocol gateway hostname is empty".into(),
                ));
            }
            return Ok(gateway.clone());
        }
        if self.iothub_name.is_empty() {
            return Err(TransportError::InvalidArgument("iothub name is empty".into()));
        }
        if self.iothub_suffix.is_empty() {
            return Err(TransportError::InvalidArgument(
                "iothub suffix is empty".into(),
            ));
        }
        Ok(format!("{}.{}", self.iothub_name, self.iothub_suffix))
    }
}

/// How a device authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Base64 device key; SAS tokens are generated per request.
    SharedKey(String),
    /// Pre-built SAS token sent as is.
    SasToken(String),
    /// Client certificate at the TLS layer; no authorization header.
    X509,
}

/// Registration parameters for one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Device ID.
    pub device_id: String,
    /// Base64 device key.
    pub device_key: Option<String>,
    /// Pre-built SAS token.
    pub device_sas_token: Option<String>,
    /// Authenticate with a client certificate.
    pub use_x509: bool,
}

impl DeviceConfig {
    /// Creates a device configuration with no credential.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// Sets the device key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.device_key = Some(key.into());
        self
    }

    /// Sets a pre-built SAS token.
    pub fn with_sas_token(mut self, token: impl Into<String>) -> Self {
        self.device_sas_token = Some(token.into());
        self
    }

    /// Authenticates with a client certificate.
    pub fn with_x509(mut self) -> Self {
        self.use_x509 = true;
        self
    }

    /// Validates the configuration and returns the credential mode.
    pub fn credential(&self) -> TransportResult<Credential> {
        if self.device_id.is_empty() {
            return Err(TransportError::InvalidArgument("device id is empty".into()));
        }
        match (&self.device_key, &self.device_sas_token) {
            (Some(_), Some(_)) => Err(TransportError::InvalidArgument(
                "device key and sas token are mutually exclusive".into(),
            )),
            (Some(key), None) => Ok(Credential::SharedKey(key.clone())),
            (None, Some(token)) => Ok(Credential::SasToken(token.clone())),
            (None, None) if self.use_x509 => Ok(Credential::X509),
            (None, None) => Err(TransportError::InvalidArgument(
                "device has neither key, sas token nor certificate".into(),
            )),
        }
    }
}
