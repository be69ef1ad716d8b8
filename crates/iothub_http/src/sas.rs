//! Shared access signature tokens.
//!
//! A device holding a shared key signs `"<encoded resource>\n<expiry>"`
//! with HMAC-SHA256 and sends
//!
//! ```text
//! SharedAccessSignature sr=<encoded resource>&sig=<encoded signature>&se=<expiry>
//! ```
//!
//! where `<expiry>` is in seconds since the Unix epoch.

use crate::error::{TransportError, TransportResult};
use crate::http::url_encode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Generates SAS tokens for one device.
#[derive(Clone)]
pub struct SasSigner {
    key: Vec<u8>,
    encoded_resource: String,
    lifetime: Duration,
}

impl SasSigner {
    /// Creates a signer from a base64 device key.
    ///
    /// `resource` is the unencoded resource URI, `<host>/devices/<id>`.
    pub fn new(encoded_key: &str, resource: &str, lifetime: Duration) -> TransportResult<Self> {
        let key = STANDARD
            .decode(encoded_key)
            .map_err(|e| TransportError::Credential(format!("device key is not base64: {e}")))?;
        if key.is_empty() {
            return Err(TransportError::Credential("device key is empty".into()));
        }
        Ok(Self {
            key,
            encoded_resource: url_encode(resource),
            lifetime,
        })
    }

    /// Returns the encoded resource URI the tokens are scoped to.
    pub fn encoded_resource(&self) -> &str {
        &self.encoded_resource
    }

    /// Builds a token valid from `now` for the configured lifetime.
    pub fn token_at(&self, now: SystemTime) -> TransportResult<String> {
        let expiry = now
            .checked_add(self.lifetime)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .ok_or_else(|| TransportError::Credential("token expiry out of range".into()))?
            .as_secs();

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| TransportError::Credential(e.to_string()))?;
        mac.update(self.encoded_resource.as_bytes());
        mac.update(b"\n");
        mac.update(expiry.to_string().as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "SharedAccessSignature sr={}&sig={}&se={}",
            self.encoded_resource,
            url_encode(&signature),
            expiry
        ))
    }
}

impl fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasSigner")
            .field("encoded_resource", &self.encoded_resource)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
