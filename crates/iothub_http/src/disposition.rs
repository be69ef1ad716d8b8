//! Settling delivered messages.

use crate::clock::Clock;
use crate::device::DeviceState;
use crate::error::{TransportError, TransportResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest};
use crate::transport::TransportStats;
use iothub_message::{DispositionResult, DispositionToken, ReceivedMessage};
use tracing::debug;

const EXPECTED_STATUS: u16 = 204;

/// Accepts, rejects or abandons a delivered message.
///
/// The message is consumed whatever happens. Only a missing token is
/// reported as an error; the hub's answer is logged.
pub(crate) fn dispose<C: HttpClient>(
    device: &DeviceState,
    http: &C,
    clock: &dyn Clock,
    mut message: ReceivedMessage,
    result: DispositionResult,
    stats: &mut TransportStats,
) -> TransportResult<()> {
    let token = message
        .take_token()
        .ok_or(TransportError::MissingDispositionToken)?;

    let method = match result {
        DispositionResult::Abandoned => HttpMethod::Post,
        DispositionResult::Accepted | DispositionResult::Rejected => HttpMethod::Delete,
    };
    let request = HttpRequest::new(
        method,
        device.disposition_path(&token, result),
        device.disposition_headers(&token),
    );

    stats.dispositions += 1;
    match device.execute(http, clock, request) {
        Ok(response) if response.status == EXPECTED_STATUS => {
            debug!(
                "message {} for {} {}",
                token.as_str(),
                device.device_id(),
                result
            );
        }
        Ok(response) => stats.record_error(
            &context(device, &token, result),
            TransportError::UnexpectedStatus(response.status),
        ),
        Err(err) => stats.record_error(&context(device, &token, result), err),
    }
    Ok(())
}

fn context(device: &DeviceState, token: &DispositionToken, result: DispositionResult) -> String {
    format!("disposition ({}) of {} for {}", result, token.as_str(), device.device_id())
}
