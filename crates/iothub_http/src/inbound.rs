//! Cloud-to-device polling.

use crate::callbacks::{Delivery, TransportCallbacks};
use crate::clock::Clock;
use crate::device::DeviceState;
use crate::disposition::dispose;
use crate::http::{HttpClient, HttpHeaders, HttpMethod, HttpRequest, ETAG};
use crate::transport::TransportStats;
use iothub_message::{DispositionToken, Message, ReceivedMessage, APP_PROPERTY_PREFIX};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace, warn};

const MESSAGE_ID_HEADER: &str = "iothub-messageid";
const CORRELATION_ID_HEADER: &str = "iothub-correlationid";
const CONTENT_TYPE_HEADER: &str = "ContentType";
const CONTENT_ENCODING_HEADER: &str = "ContentEncoding";

/// Returns true if a device that last polled at `last_poll` may poll at `now`.
///
/// An unreadable clock, or one that moved backwards, allows the poll.
pub(crate) fn polling_due(
    last_poll: Option<SystemTime>,
    now: Option<SystemTime>,
    interval: Duration,
) -> bool {
    match (last_poll, now) {
        (Some(last), Some(now)) => match now.duration_since(last) {
            Ok(elapsed) => elapsed >= interval,
            Err(_) => true,
        },
        _ => true,
    }
}

/// Polls one device if it is subscribed and due.
///
/// The interval is measured between request starts: `last_poll` is the
/// time read before the request went out.
pub(crate) fn poll<C: HttpClient, B: TransportCallbacks>(
    device: &mut DeviceState,
    http: &C,
    clock: &dyn Clock,
    callbacks: &mut B,
    interval: Duration,
    stats: &mut TransportStats,
) {
    if !device.subscribed {
        return;
    }
    let started = clock.now();
    if !polling_due(device.last_poll, started, interval) {
        trace!("poll for {} not due", device.device_id());
        return;
    }

    let request = HttpRequest::new(
        HttpMethod::Get,
        device.message_path(),
        device.message_headers().clone(),
    );
    let response = match device.execute(http, clock, request) {
        Ok(response) => response,
        Err(err) => {
            stats.record_error(&format!("poll for {}", device.device_id()), err);
            return;
        }
    };
    device.last_poll = started;
    stats.polls += 1;

    if response.status != 200 {
        debug!(
            "poll for {} answered {}, no message",
            device.device_id(),
            response.status
        );
        return;
    }

    let token = match response.headers.get(ETAG).map(DispositionToken::from_etag) {
        Some(Ok(token)) => token,
        Some(Err(err)) => {
            warn!("discarding delivery for {}: {}", device.device_id(), err);
            return;
        }
        None => {
            warn!("discarding delivery for {}: no ETag", device.device_id());
            return;
        }
    };

    let message = delivered_message(&response.headers, response.body);
    stats.messages_received += 1;
    debug!(
        "received message for {} (etag {})",
        device.device_id(),
        token.as_str()
    );

    let delivered = token.as_str().to_string();
    let delivery = callbacks.message_received(
        device.handle(),
        ReceivedMessage::with_token(message, token),
    );
    if let Delivery::Settle(message, result) = delivery {
        if !settles_delivery(&message, &delivered) {
            warn!(
                "{} settled a message other than {}, ignored",
                device.device_id(),
                delivered
            );
            return;
        }
        if let Err(err) = dispose(device, http, clock, message, result, stats) {
            warn!("settling message for {} failed: {}", device.device_id(), err);
        }
    }
}

/// Returns true if `message` carries the token of the delivery being settled.
fn settles_delivery(message: &ReceivedMessage, delivered: &str) -> bool {
    message.token().map(DispositionToken::as_str) == Some(delivered)
}

/// Rebuilds a message from a poll response.
pub(crate) fn delivered_message(headers: &HttpHeaders, body: Vec<u8>) -> Message {
    let mut message = Message::from_bytes(body);
    for (name, value) in headers.iter() {
        if let Some(key) = strip_prefix_ignore_case(name, APP_PROPERTY_PREFIX) {
            if !key.is_empty() {
                message.properties_mut().insert(key, value);
            }
        }
    }
    if let Some(id) = headers.get(MESSAGE_ID_HEADER) {
        message.set_message_id(id);
    }
    if let Some(id) = headers.get(CORRELATION_ID_HEADER) {
        message.set_correlation_id(id);
    }
    if let Some(content_type) = headers.get(CONTENT_TYPE_HEADER) {
        message.set_content_type(content_type);
    }
    if let Some(encoding) = headers.get(CONTENT_ENCODING_HEADER) {
        message.set_content_encoding(encoding);
    }
    message
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}
