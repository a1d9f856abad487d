//! Error types for the backend proxy layer.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! OAuth protocol errors live in [`crate::server::oauth::error`]; this module covers
//! the outbound hop to the MCP backend.

use std::time::Duration;

/// Errors from forwarding a request to the MCP backend.
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// The backend could not be reached (connection refused, DNS, TLS).
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend did not respond within the configured timeout.
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// The inbound request could not be replayed (unsupported method,
    /// malformed header value).
    #[error("Bad gateway request: {0}")]
    BadRequest(String),
}

impl ProxyError {
    /// Wrap a `reqwest` failure, distinguishing timeouts from connectivity.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::BackendUnavailable(err.to_string())
        }
    }

    /// HTTP status this error maps to. Connectivity and timeout failures
    /// surface as 502; replay failures as 400.
    #[must_use]
    pub const fn status(&self) -> axum::http::StatusCode {
        match self {
            Self::BackendUnavailable(_) | Self::Timeout(_) => {
                axum::http::StatusCode::BAD_GATEWAY
            }
            Self::BadRequest(_) => axum::http::StatusCode::BAD_REQUEST,
        }
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
