//! Test doubles for the transport's collaborators.

use crate::callbacks::{ConfirmationResult, Delivery, TransportCallbacks};
use crate::clock::Clock;
use crate::device::DeviceHandle;
use crate::error::{HttpError, TransportError, TransportResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, OptionValue};
use crate::queue::OutgoingMessage;
use iothub_message::{DispositionResult, Message, ReceivedMessage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// A scripted HTTP client.
///
/// Responses queued with [`push_response`](Self::push_response) are
/// returned in order; once they run out the default response (204 with no
/// body) is returned. Every request is recorded.
#[derive(Debug)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    default_response: Mutex<Result<HttpResponse, HttpError>>,
    requests: Mutex<Vec<HttpRequest>>,
    options: Mutex<Vec<(String, OptionValue)>>,
    known_options: Vec<String>,
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHttpClient {
    /// Creates a mock that answers 204 to everything.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(Ok(HttpResponse::new(204))),
            requests: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            known_options: Vec::new(),
        }
    }

    /// Accepts the named option in `set_option`.
    pub fn with_known_option(mut self, name: impl Into<String>) -> Self {
        self.known_options.push(name.into());
        self
    }

    /// Queues a response.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues an execution failure.
    pub fn push_error(&self, error: HttpError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Sets the answer used once the queue is empty.
    pub fn set_default_response(&self, response: Result<HttpResponse, HttpError>) {
        *self.default_response.lock() = response;
    }

    /// Returns all requests executed so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the options accepted so far.
    pub fn options(&self) -> Vec<(String, OptionValue)> {
        self.options.lock().clone()
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(request.clone());
        match self.responses.lock().pop_front() {
            Some(response) => response,
            None => self.default_response.lock().clone(),
        }
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> TransportResult<()> {
        if !self.known_options.iter().any(|known| known == name) {
            return Err(TransportError::UnknownOption(name.to_string()));
        }
        self.options.lock().push((name.to_string(), value.clone()));
        Ok(())
    }
}

/// A manually driven clock.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<Option<SystemTime>>,
}

impl MockClock {
    /// Creates a clock reading `now`.
    pub fn at(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(Some(now)),
        }
    }

    /// Creates a clock that cannot be read.
    pub fn unavailable() -> Self {
        Self {
            now: Mutex::new(None),
        }
    }

    /// Moves the clock forward. No effect while unavailable.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.and_then(|t| t.checked_add(by));
    }

    /// Moves the clock backward. No effect while unavailable.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.and_then(|t| t.checked_sub(by));
    }

    /// Sets the clock.
    pub fn set(&self, now: SystemTime) {
        *self.now.lock() = Some(now);
    }

    /// Makes the clock unreadable.
    pub fn set_unavailable(&self) {
        *self.now.lock() = None;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Option<SystemTime> {
        *self.now.lock()
    }
}

/// One `send_complete` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Device the messages belonged to.
    pub device: DeviceHandle,
    /// Completed messages, in queue order.
    pub messages: Vec<OutgoingMessage>,
    /// Outcome.
    pub result: ConfirmationResult,
}

impl Completion {
    /// Returns the tags of the completed messages.
    pub fn ids(&self) -> Vec<u64> {
        self.messages.iter().map(OutgoingMessage::id).collect()
    }
}

/// Callbacks that record everything they see.
///
/// Delivered messages are deferred and kept for later disposition unless
/// [`settle_with`](Self::settle_with) is set.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    completions: Vec<Completion>,
    delivered: Vec<(DeviceHandle, Message)>,
    deferred: Vec<(DeviceHandle, ReceivedMessage)>,
    settle_with: Option<DispositionResult>,
    product_info: Option<String>,
}

impl RecordingCallbacks {
    /// Creates callbacks that defer every delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settles every delivery immediately with `result`.
    pub fn settle_with(mut self, result: DispositionResult) -> Self {
        self.settle_with = Some(result);
        self
    }

    /// Reports a product string for the user agent.
    pub fn with_product_info(mut self, product_info: impl Into<String>) -> Self {
        self.product_info = Some(product_info.into());
        self
    }

    /// Returns all recorded completions.
    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    /// Returns copies of all delivered messages.
    pub fn delivered(&self) -> &[(DeviceHandle, Message)] {
        &self.delivered
    }

    /// Takes the deferred messages for disposition.
    pub fn take_deferred(&mut self) -> Vec<(DeviceHandle, ReceivedMessage)> {
        std::mem::take(&mut self.deferred)
    }
}

impl TransportCallbacks for RecordingCallbacks {
    fn send_complete(
        &mut self,
        device: DeviceHandle,
        messages: Vec<OutgoingMessage>,
        result: ConfirmationResult,
    ) {
        self.completions.push(Completion {
            device,
            messages,
            result,
        });
    }

    fn message_received(&mut self, device: DeviceHandle, message: ReceivedMessage) -> Delivery {
        self.delivered.push((device, message.message().clone()));
        match self.settle_with {
            Some(result) => Delivery::Settle(message, result),
            None => {
                self.deferred.push((device, message));
                Delivery::Defer
            }
        }
    }

    fn product_info(&self) -> Option<String> {
        self.product_info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpHeaders, HttpMethod};
    use std::time::UNIX_EPOCH;

    fn get() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "/x", HttpHeaders::new())
    }

    #[test]
    fn scripted_then_default() {
        let http = MockHttpClient::new();
        http.push_response(HttpResponse::new(200));
        http.push_error(HttpError::retryable("reset"));

        assert_eq!(http.execute(&get()).unwrap().status, 200);
        assert!(http.execute(&get()).is_err());
        assert_eq!(http.execute(&get()).unwrap().status, 204);
        assert_eq!(http.request_count(), 3);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let mut http = MockHttpClient::new().with_known_option("timeout");
        assert!(http.set_option("timeout", &OptionValue::U64(10)).is_ok());
        assert!(matches!(
            http.set_option("proxy", &OptionValue::Str("p".into())),
            Err(TransportError::UnknownOption(_))
        ));
        assert_eq!(http.options().len(), 1);
    }

    #[test]
    fn clock_moves() {
        let clock = MockClock::at(UNIX_EPOCH);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), Some(UNIX_EPOCH + Duration::from_secs(5)));
        clock.rewind(Duration::from_secs(2));
        assert_eq!(clock.now(), Some(UNIX_EPOCH + Duration::from_secs(3)));
        clock.set_unavailable();
        assert_eq!(clock.now(), None);
        clock.set(UNIX_EPOCH);
        assert_eq!(clock.now(), Some(UNIX_EPOCH));
    }
}
