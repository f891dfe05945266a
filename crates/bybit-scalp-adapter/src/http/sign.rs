/*
[INPUT]:  Request payloads, API credentials, and wall-clock timestamps
[OUTPUT]: Signed request headers (X-BAPI-SIGN and friends)
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or header format
*/

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const HEADER_API_KEY: &str = "X-BAPI-API-KEY";
pub const HEADER_TIMESTAMP: &str = "X-BAPI-TIMESTAMP";
pub const HEADER_RECV_WINDOW: &str = "X-BAPI-RECV-WINDOW";
pub const HEADER_SIGN: &str = "X-BAPI-SIGN";

pub const DEFAULT_RECV_WINDOW: &str = "5000";

/// Signs v5 requests with the account's HMAC-SHA256 secret.
///
/// The signed message is `timestamp ‖ api_key ‖ recv_window ‖ payload`, where
/// payload is the raw JSON body for POST and the raw query string (no `?`)
/// for GET. The signature is lowercase hex.
#[derive(Debug, Clone)]
pub struct ApiSigner {
    api_key: String,
    api_secret: String,
    recv_window: String,
}

impl ApiSigner {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window: DEFAULT_RECV_WINDOW.to_string(),
        }
    }

    pub fn with_recv_window(mut self, recv_window: impl Into<String>) -> Self {
        self.recv_window = recv_window.into();
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn recv_window(&self) -> &str {
        &self.recv_window
    }

    /// Milliseconds since the Unix epoch, as the API expects in
    /// `X-BAPI-TIMESTAMP`.
    pub fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as u64
    }

    pub fn sign(&self, timestamp: u64, payload: &str) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes()).expect("HMAC key");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(self.recv_window.as_bytes());
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
