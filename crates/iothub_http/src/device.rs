//! Device registry.
//!
//! Every registered device owns its precomputed request paths, header
//! templates and credential. Nothing here is rebuilt per request except the
//! authorization header.

use crate::clock::Clock;
use crate::config::{Credential, DeviceConfig, TransportConfig};
use crate::error::{TransportError, TransportResult};
use crate::http::{
    url_encode, HttpClient, HttpHeaders, HttpRequest, HttpResponse, AUTHORIZATION, IF_MATCH,
    USER_AGENT,
};
use crate::queue::OutgoingQueue;
use crate::sas::SasSigner;
use iothub_message::{DispositionResult, DispositionToken};
use std::fmt;
use std::time::SystemTime;

const EVENT_ENDPOINT: &str = "/messages/events";
const MESSAGE_ENDPOINT: &str = "/messages/devicebound";

/// Placeholder replaced by the resolved credential before each request.
const AUTHORIZATION_PLACEHOLDER: &str = " ";

/// Identifies a registered device within one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[derive(Debug)]
enum Authorization {
    SharedKey(SasSigner),
    SasToken(String),
    X509,
}

/// Per-device registration state.
#[derive(Debug)]
pub(crate) struct DeviceState {
    handle: DeviceHandle,
    device_id: String,
    authorization: Authorization,
    queue: OutgoingQueue,
    pub(crate) subscribed: bool,
    pub(crate) last_poll: Option<SystemTime>,
    event_path: String,
    message_path: String,
    disposition_prefix: String,
    api_version: String,
    event_headers: HttpHeaders,
    message_headers: HttpHeaders,
    user_agent: String,
}

impl DeviceState {
    fn new(
        handle: DeviceHandle,
        device: &DeviceConfig,
        queue: OutgoingQueue,
        transport: &TransportConfig,
        hostname: &str,
        user_agent: &str,
    ) -> TransportResult<Self> {
        let encoded_id = url_encode(&device.device_id);
        let device_prefix = format!("/devices/{encoded_id}");
        let api = format!("?api-version={}", transport.api_version);

        let authorization = match device.credential()? {
            Credential::SharedKey(key) => Authorization::SharedKey(SasSigner::new(
                &key,
                &format!("{hostname}{device_prefix}"),
                transport.sas_token_lifetime,
            )?),
            Credential::SasToken(token) => Authorization::SasToken(token),
            Credential::X509 => Authorization::X509,
        };
        let needs_authorization = !matches!(authorization, Authorization::X509);

        let mut event_headers = HttpHeaders::new();
        event_headers.add("iothub-to", format!("{device_prefix}{EVENT_ENDPOINT}"));
        if needs_authorization {
            event_headers.add(AUTHORIZATION, AUTHORIZATION_PLACEHOLDER);
        }
        event_headers.add("Accept", "application/json");
        event_headers.add("Connection", "Keep-Alive");
        event_headers.add(USER_AGENT, user_agent);

        let mut message_headers = HttpHeaders::new();
        message_headers.add(USER_AGENT, user_agent);
        if needs_authorization {
            message_headers.add(AUTHORIZATION, AUTHORIZATION_PLACEHOLDER);
        }

        Ok(Self {
            handle,
            device_id: device.device_id.clone(),
            authorization,
            queue,
            subscribed: false,
            last_poll: None,
            event_path: format!("{device_prefix}{EVENT_ENDPOINT}{api}"),
            message_path: format!("{device_prefix}{MESSAGE_ENDPOINT}{api}"),
            disposition_prefix: format!("{device_prefix}{MESSAGE_ENDPOINT}/"),
            api_version: transport.api_version.clone(),
            event_headers,
            message_headers,
            user_agent: user_agent.to_string(),
        })
    }

    pub(crate) fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub(crate) fn device_id(&self) -> &str {
        &self.device_id
    }

    pub(crate) fn queue(&self) -> &OutgoingQueue {
        &self.queue
    }

    pub(crate) fn event_path(&self) -> &str {
        &self.event_path
    }

    pub(crate) fn message_path(&self) -> &str {
        &self.message_path
    }

    pub(crate) fn event_headers(&self) -> &HttpHeaders {
        &self.event_headers
    }

    pub(crate) fn message_headers(&self) -> &HttpHeaders {
        &self.message_headers
    }

    /// Builds the path that settles the message identified by `token`.
    pub(crate) fn disposition_path(
        &self,
        token: &DispositionToken,
        result: DispositionResult,
    ) -> String {
        let base = format!("{}{}", self.disposition_prefix, token.as_str());
        let api = &self.api_version;
        match result {
            DispositionResult::Accepted => format!("{base}?api-version={api}"),
            DispositionResult::Abandoned => format!("{base}/abandon?api-version={api}"),
            DispositionResult::Rejected => format!("{base}?api-version={api}&reject"),
        }
    }

    /// Headers for a disposition request, authorization still unresolved.
    pub(crate) fn disposition_headers(&self, token: &DispositionToken) -> HttpHeaders {
        let mut headers = HttpHeaders::new();
        headers.add(USER_AGENT, self.user_agent.as_str());
        if !matches!(self.authorization, Authorization::X509) {
            headers.add(AUTHORIZATION, AUTHORIZATION_PLACEHOLDER);
        }
        headers.add(IF_MATCH, token.quoted());
        headers
    }

    fn authorize(&self, headers: &mut HttpHeaders, clock: &dyn Clock) -> TransportResult<()> {
        match &self.authorization {
            Authorization::SharedKey(signer) => {
                let now = clock.now().ok_or(TransportError::ClockUnavailable)?;
                headers.replace(AUTHORIZATION, signer.token_at(now)?);
            }
            Authorization::SasToken(token) => headers.replace(AUTHORIZATION, token.as_str()),
            Authorization::X509 => {}
        }
        Ok(())
    }

    /// Resolves the credential and executes the request.
    pub(crate) fn execute<C: HttpClient>(
        &self,
        http: &C,
        clock: &dyn Clock,
        mut request: HttpRequest,
    ) -> TransportResult<HttpResponse> {
        self.authorize(&mut request.headers, clock)?;
        Ok(http.execute(&request)?)
    }
}

/// Registered devices in registration order.
#[derive(Debug, Default)]
pub(crate) struct DeviceRegistry {
    devices: Vec<DeviceState>,
    next_handle: u64,
}

impl DeviceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a device. On failure nothing is added.
    pub(crate) fn register(
        &mut self,
        device: &DeviceConfig,
        queue: OutgoingQueue,
        transport: &TransportConfig,
        hostname: &str,
        user_agent: &str,
    ) -> TransportResult<DeviceHandle> {
        if self.devices.iter().any(|d| d.device_id == device.device_id) {
            return Err(TransportError::DeviceAlreadyRegistered(
                device.device_id.clone(),
            ));
        }
        let handle = DeviceHandle::from_raw(self.next_handle);
        let state = DeviceState::new(handle, device, queue, transport, hostname, user_agent)?;
        self.next_handle += 1;
        self.devices.push(state);
        Ok(handle)
    }

    pub(crate) fn remove(&mut self, handle: DeviceHandle) -> Option<DeviceState> {
        let index = self.devices.iter().position(|d| d.handle == handle)?;
        Some(self.devices.remove(index))
    }

    pub(crate) fn get(&self, handle: DeviceHandle) -> Option<&DeviceState> {
        self.devices.iter().find(|d| d.handle == handle)
    }

    pub(crate) fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut DeviceState> {
        self.devices.iter_mut().find(|d| d.handle == handle)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceState> {
        self.devices.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.devices.len()
    }
}
