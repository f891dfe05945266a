/*
[INPUT]:  HTTP configuration (base URL, timeouts, credentials)
[OUTPUT]: Configured reqwest client ready for v5 API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing request plumbing
*/

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::error::{BybitError, Result};
use super::sign::{ApiSigner, HEADER_API_KEY, HEADER_RECV_WINDOW, HEADER_SIGN, HEADER_TIMESTAMP};

const MAINNET_BASE_URL: &str = "https://api.bybit.com";

const MAX_GET_RETRIES: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// API credentials for authenticated requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Main HTTP client for the Bybit v5 API.
#[derive(Debug)]
pub struct BybitClient {
    http_client: Client,
    base_url: Url,
    signer: Option<ApiSigner>,
}

impl BybitClient {
    /// Create a new client against the mainnet host with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config_and_base_url(ClientConfig::default(), MAINNET_BASE_URL)
    }

    /// Create a new client with a custom base URL (testnet, wiremock).
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            signer: None,
        })
    }

    /// Set credentials for authenticated requests.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.signer = Some(ApiSigner::new(credentials.api_key, credentials.api_secret));
    }

    pub fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    fn require_signer(&self) -> Result<&ApiSigner> {
        self.signer
            .as_ref()
            .ok_or_else(|| BybitError::Config("credentials not set".to_string()))
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Signed POST with a JSON body; the raw body string is the signed payload.
    pub(crate) async fn signed_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let signer = self.require_signer()?;
        let payload = serde_json::to_string(body)?;
        let timestamp = ApiSigner::timestamp_ms();
        let signature = signer.sign(timestamp, &payload);

        let builder = self
            .request(Method::POST, endpoint)?
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_API_KEY, signer.api_key())
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_RECV_WINDOW, signer.recv_window())
            .header(HEADER_SIGN, signature)
            .body(payload);

        self.send_api(builder).await
    }

    /// Signed GET; the raw query string (without `?`) is the signed payload.
    pub(crate) async fn signed_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<T> {
        let signer = self.require_signer()?;
        let timestamp = ApiSigner::timestamp_ms();
        let signature = signer.sign(timestamp, query);

        let builder = self
            .request(Method::GET, &format!("{endpoint}?{query}"))?
            .header(HEADER_API_KEY, signer.api_key())
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_RECV_WINDOW, signer.recv_window())
            .header(HEADER_SIGN, signature);

        self.send_api_with_retry(builder).await
    }

    /// Unauthenticated GET for public market data.
    pub(crate) async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<T> {
        let builder = self.request(Method::GET, &format!("{endpoint}?{query}"))?;
        self.send_api_with_retry(builder).await
    }

    async fn send_api_with_retry<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T> {
        let mut retries = 0;

        loop {
            let attempt = builder
                .try_clone()
                .ok_or_else(|| BybitError::Config("request cannot be cloned".to_string()))?;

            match self.send_api(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retries < MAX_GET_RETRIES => {
                    retries += 1;
                    tracing::debug!(error = %err, retries, "retrying market data request");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_api<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<JsonValue>(&body) {
                Ok(JsonValue::Object(map)) => map
                    .get("retMsg")
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| body.clone()),
                _ => body.clone(),
            };
            return Err(BybitError::Api {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        // Error envelopes carry `result: {}`, so the envelope is decoded
        // before the result payload.
        let envelope: ApiEnvelope = serde_json::from_str(&body)?;
        if envelope.ret_code != 0 {
            return Err(BybitError::Api {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        serde_json::from_value(envelope.result).map_err(BybitError::from)
    }
}

#[derive(Debug, serde::Deserialize)]
struct ApiEnvelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: JsonValue,
}
