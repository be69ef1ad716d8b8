//! HTTP client abstraction.
//!
//! The engine never talks to the network itself. Every request goes
//! through an [`HttpClient`], which allows plugging in a real client
//! (`ReqwestClient` with the `reqwest` feature) or the scripted
//! [`MockHttpClient`](crate::MockHttpClient) in tests.

use crate::error::{HttpError, TransportError, TransportResult};
use url::form_urlencoded;

/// Request header carrying the credential.
pub const AUTHORIZATION: &str = "Authorization";
/// Request and response content type header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// User agent header.
pub const USER_AGENT: &str = "User-Agent";
/// Conditional request header used for dispositions.
pub const IF_MATCH: &str = "If-Match";
/// Response header carrying the entity tag of a delivered message.
pub const ETAG: &str = "ETag";

/// Option name understood by `ReqwestClient`: request timeout in milliseconds.
pub const OPTION_HTTP_TIMEOUT: &str = "timeout";

/// HTTP methods used by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// DELETE.
    Delete,
}

/// An ordered, case-insensitive header collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header without checking for an existing one.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header, replacing the value of an existing one in place.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Validates and sets a header.
    pub fn try_replace(&mut self, name: &str, value: &str) -> TransportResult<()> {
        validate_header(name, value)?;
        self.replace(name, value);
        Ok(())
    }

    /// Gets a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks that a header can be put on the wire.
///
/// Names must be non-empty RFC 7230 tokens; values must not contain
/// control characters other than horizontal tab.
pub fn validate_header(name: &str, value: &str) -> TransportResult<()> {
    let invalid = |reason| TransportError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if !name.bytes().all(is_token_byte) {
        return Err(invalid("name is not a token"));
    }
    if value.chars().any(|c| c.is_control() && c != '\t') {
        return Err(invalid("value contains control characters"));
    }
    Ok(())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Percent-encodes a value for use in a path or SAS token.
pub fn url_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// A request relative to the transport's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Path and query, starting with `/`.
    pub path: String,
    /// Request headers.
    pub headers: HttpHeaders,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without a body.
    pub fn new(method: HttpMethod, path: impl Into<String>, headers: HttpHeaders) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body: None,
        }
    }

    /// Attaches a body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HttpHeaders,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HttpHeaders::new(),
            body: Vec::new(),
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A value passed to `set_option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Boolean option.
    Bool(bool),
    /// Integer option.
    U64(u64),
    /// String option.
    Str(String),
}

/// HTTP client abstraction.
///
/// Implementations execute one request and report the status, headers and
/// body. They must not retry on their own: the engine retries on its next
/// work cycle.
pub trait HttpClient: Send + Sync {
    /// Executes a request against the transport's host.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;

    /// Applies a client-specific option.
    fn set_option(&mut self, name: &str, _value: &OptionValue) -> TransportResult<()> {
        Err(TransportError::UnknownOption(name.to_string()))
    }
}

/// A blocking [`reqwest`]-backed HTTP client.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    base_url: String,
    inner: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestClient {
    /// Creates a client sending every request to `https://<hostname>`.
    pub fn new(hostname: &str) -> TransportResult<Self> {
        let inner = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| HttpError::fatal(e.to_string()))?;
        Ok(Self {
            base_url: format!("https://{hostname}"),
            inner,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .inner
            .request(method, format!("{}{}", self.base_url, request.path));
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| HttpError::retryable(e.to_string()))?;
        let status = response.status().as_u16();

        let mut headers = HttpHeaders::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.add(name.as_str(), value);
            }
        }

        let body = response
            .bytes()
            .map_err(|e| HttpError::retryable(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> TransportResult<()> {
        match (name, value) {
            (OPTION_HTTP_TIMEOUT, OptionValue::U64(millis)) => {
                self.inner = reqwest::blocking::Client::builder()
                    .timeout(std::time::Duration::from_millis(*millis))
                    .build()
                    .map_err(|e| HttpError::fatal(e.to_string()))?;
                Ok(())
            }
            (OPTION_HTTP_TIMEOUT, _) => Err(TransportError::InvalidOptionValue(name.to_string())),
            _ => Err(TransportError::UnknownOption(name.to_string())),
        }
    }
}
