/*
[INPUT]:  Error sources (HTTP transport, API rejections, serialization)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error type for the adapter
[UPDATE]: When adding new error sources or retCode classifications
*/

use thiserror::Error;

// v5 "order does not exist or too late to cancel" for linear/inverse and spot.
const RET_CODE_ORDER_NOT_EXISTS_LINEAR: i64 = 110001;
const RET_CODE_ORDER_NOT_EXISTS_SPOT: i64 = 170213;

/// Main error type for the Bybit adapter.
#[derive(Error, Debug)]
pub enum BybitError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-zero retCode
    #[error("API error (retCode {code}): {message}")]
    Api { code: i64, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Structurally valid HTTP response with nonsense content
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client misconfiguration (missing credentials, bad base URL)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BybitError {
    /// Check if the error is worth retrying on a later tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BybitError::Http(_) | BybitError::InvalidResponse(_)
        )
    }

    /// True when the exchange reports the order as unknown or already gone.
    ///
    /// Cancels hitting this are treated as successes by callers: the order
    /// either filled or was never accepted, and reconciliation settles it.
    pub fn is_unknown_order(&self) -> bool {
        matches!(
            self,
            BybitError::Api { code, .. }
                if *code == RET_CODE_ORDER_NOT_EXISTS_LINEAR
                    || *code == RET_CODE_ORDER_NOT_EXISTS_SPOT
        )
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, BybitError>;
