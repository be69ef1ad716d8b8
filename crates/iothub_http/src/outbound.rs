//! Device-to-cloud sends.
//!
//! One call drains at most one request's worth of a device queue. Messages
//! leave the queue only when their outcome is final: the hub accepted them,
//! or they can never be sent. On a transient failure they stay where they
//! were, in order, for the next work cycle.

use crate::callbacks::{ConfirmationResult, TransportCallbacks};
use crate::clock::Clock;
use crate::device::DeviceState;
use crate::error::{TransportError, TransportResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest, CONTENT_TYPE};
use crate::queue::OutgoingMessage;
use crate::transport::TransportStats;
use iothub_message::{BatchWriter, Message, APP_PROPERTY_PREFIX, MAXIMUM_MESSAGE_SIZE};
use tracing::{debug, warn};

const SINGLE_CONTENT_TYPE: &str = "application/octet-stream";
const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.iothub.json";

const MESSAGE_ID_HEADER: &str = "iothub-messageid";
const CORRELATION_ID_HEADER: &str = "iothub-correlationid";
const CONTENT_TYPE_HEADER: &str = "iothub-contenttype";
const CONTENT_ENCODING_HEADER: &str = "iothub-contentencoding";

/// Sends whatever is due for one device.
pub(crate) fn process<C: HttpClient, B: TransportCallbacks>(
    device: &DeviceState,
    http: &C,
    clock: &dyn Clock,
    callbacks: &mut B,
    batching: bool,
    stats: &mut TransportStats,
) {
    if device.queue().is_empty() {
        return;
    }
    if batching {
        send_batch(device, http, clock, callbacks, stats);
    } else {
        send_single(device, http, clock, callbacks, stats);
    }
}

fn send_single<C: HttpClient, B: TransportCallbacks>(
    device: &DeviceState,
    http: &C,
    clock: &dyn Clock,
    callbacks: &mut B,
    stats: &mut TransportStats,
) {
    let Some(prepared) = device
        .queue()
        .with_front(|head| single_request(device, head.message()))
    else {
        return;
    };

    let request = match prepared {
        Ok(request) => request,
        Err(err) if err.is_fatal_for_message() => {
            if let Some(head) = device.queue().pop_front() {
                fail(device, callbacks, stats, head, err);
            }
            return;
        }
        Err(err) => {
            stats.record_error(&format!("event for {}", device.device_id()), err);
            return;
        }
    };

    match device.execute(http, clock, request) {
        Ok(response) if response.status < 300 => {
            if let Some(head) = device.queue().pop_front() {
                debug!("sent message {} for {}", head.id(), device.device_id());
                stats.messages_confirmed += 1;
                callbacks.send_complete(
                    device.handle(),
                    vec![head],
                    ConfirmationResult::Confirmed,
                );
            }
        }
        Ok(response) => stats.record_error(
            &format!("event post for {}", device.device_id()),
            TransportError::UnexpectedStatus(response.status),
        ),
        Err(err) => stats.record_error(&format!("event post for {}", device.device_id()), err),
    }
}

/// Builds the request for a single unbatched message.
fn single_request(device: &DeviceState, message: &Message) -> TransportResult<HttpRequest> {
    let size = message.accounted_size();
    if size > MAXIMUM_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            size,
            limit: MAXIMUM_MESSAGE_SIZE,
        });
    }

    let mut headers = device.event_headers().clone();
    headers.replace(CONTENT_TYPE, SINGLE_CONTENT_TYPE);
    for (key, value) in message.properties().iter() {
        headers.try_replace(&format!("{APP_PROPERTY_PREFIX}{key}"), value)?;
    }
    let system = [
        (MESSAGE_ID_HEADER, message.message_id()),
        (CORRELATION_ID_HEADER, message.correlation_id()),
        (CONTENT_TYPE_HEADER, message.content_type()),
        (CONTENT_ENCODING_HEADER, message.content_encoding()),
    ];
    for (name, value) in system {
        if let Some(value) = value {
            headers.try_replace(name, value)?;
        }
    }

    Ok(HttpRequest::new(HttpMethod::Post, device.event_path(), headers)
        .with_body(message.body().as_bytes().to_vec()))
}

fn send_batch<C: HttpClient, B: TransportCallbacks>(
    device: &DeviceState,
    http: &C,
    clock: &dyn Clock,
    callbacks: &mut B,
    stats: &mut TransportStats,
) {
    let queue = device.queue();
    let mut writer = BatchWriter::new();
    let mut included: Vec<OutgoingMessage> = Vec::new();
    let mut total = 0usize;

    while let Some(next) = queue.pop_front() {
        let size = next.message().accounted_size();
        if size > MAXIMUM_MESSAGE_SIZE {
            let err = TransportError::MessageTooLarge {
                size,
                limit: MAXIMUM_MESSAGE_SIZE,
            };
            fail(device, callbacks, stats, next, err);
            continue;
        }
        if total + size > MAXIMUM_MESSAGE_SIZE {
            queue.push_front(next);
            break;
        }
        if let Err(err) = writer.push(next.message()) {
            fail(device, callbacks, stats, next, err.into());
            continue;
        }
        total += size;
        included.push(next);
    }

    if included.is_empty() {
        return;
    }

    let mut headers = device.event_headers().clone();
    headers.replace(CONTENT_TYPE, BATCH_CONTENT_TYPE);
    let request =
        HttpRequest::new(HttpMethod::Post, device.event_path(), headers).with_body(writer.finish());

    match device.execute(http, clock, request) {
        Ok(response) if response.status < 300 => {
            debug!(
                "sent batch of {} messages ({} bytes accounted) for {}",
                included.len(),
                total,
                device.device_id()
            );
            stats.messages_confirmed += included.len() as u64;
            stats.batches_sent += 1;
            callbacks.send_complete(device.handle(), included, ConfirmationResult::Confirmed);
        }
        Ok(response) => {
            let context = format!(
                "batch post of {} messages for {}",
                included.len(),
                device.device_id()
            );
            queue.restore_front(included);
            stats.record_error(&context, TransportError::UnexpectedStatus(response.status));
        }
        Err(err) => {
            let context = format!(
                "batch post of {} messages for {}",
                included.len(),
                device.device_id()
            );
            queue.restore_front(included);
            stats.record_error(&context, err);
        }
    }
}

/// Drops a message that can never be sent and reports it as failed.
fn fail<B: TransportCallbacks>(
    device: &DeviceState,
    callbacks: &mut B,
    stats: &mut TransportStats,
    message: OutgoingMessage,
    err: TransportError,
) {
    warn!(
        "dropping message {} for {}: {}",
        message.id(),
        device.device_id(),
        err
    );
    stats.messages_failed += 1;
    stats.last_error = Some(err.to_string());
    callbacks.send_complete(device.handle(), vec![message], ConfirmationResult::Failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, TransportConfig};
    use crate::device::DeviceRegistry;
    use crate::queue::OutgoingQueue;
    use iothub_message::MAXIMUM_PAYLOAD_OVERHEAD;

    fn with_device<R>(f: impl FnOnce(&DeviceState) -> R) -> R {
        let mut registry = DeviceRegistry::new();
        let handle = registry
            .register(
                &DeviceConfig::new("dev1").with_sas_token("sas"),
                OutgoingQueue::new(),
                &TransportConfig::new("hub", "azure-devices.net"),
                "hub.azure-devices.net",
                "agent",
            )
            .unwrap();
        f(registry.get(handle).unwrap())
    }

    #[test]
    fn single_request_carries_properties_as_headers() {
        let message = Message::from_text("payload")
            .with_property("temp", "21")
            .with_message_id("m1")
            .with_correlation_id("c1")
            .with_content_type("application/json")
            .with_content_encoding("utf-8");

        let request = with_device(|device| single_request(device, &message)).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.path,
            "/devices/dev1/messages/events?api-version=2016-11-14"
        );
        assert_eq!(request.body.as_deref(), Some(b"payload".as_slice()));

        let headers = &request.headers;
        assert_eq!(headers.get(CONTENT_TYPE), Some(SINGLE_CONTENT_TYPE));
        assert_eq!(headers.get("iothub-app-temp"), Some("21"));
        assert_eq!(headers.get("iothub-messageid"), Some("m1"));
        assert_eq!(headers.get("iothub-correlationid"), Some("c1"));
        assert_eq!(headers.get("iothub-contenttype"), Some("application/json"));
        assert_eq!(headers.get("iothub-contentencoding"), Some("utf-8"));
        assert_eq!(headers.get("iothub-to"), Some("/devices/dev1/messages/events"));
        assert_eq!(headers.get("Accept"), Some("application/json"));
    }

    #[test]
    fn absent_system_properties_are_not_sent() {
        let message = Message::from_bytes(vec![1, 2, 3]);
        let request = with_device(|device| single_request(device, &message)).unwrap();
        assert!(!request.headers.contains("iothub-messageid"));
        assert!(!request.headers.contains("iothub-contenttype"));
    }

    #[test]
    fn oversized_message_is_refused() {
        let body = vec![0u8; MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD + 1];
        let message = Message::from_bytes(body);
        let result = with_device(|device| single_request(device, &message));
        assert!(matches!(result, Err(TransportError::MessageTooLarge { .. })));
    }

    #[test]
    fn unusable_property_is_refused() {
        let message = Message::from_text("x").with_property("bad key", "v");
        let result = with_device(|device| single_request(device, &message));
        assert!(matches!(result, Err(TransportError::InvalidHeader { .. })));

        let message = Message::from_text("x").with_property("k", "line\nbreak");
        let result = with_device(|device| single_request(device, &message));
        assert!(matches!(result, Err(TransportError::InvalidHeader { .. })));
    }
}
