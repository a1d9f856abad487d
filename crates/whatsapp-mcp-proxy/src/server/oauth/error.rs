//! OAuth protocol error taxonomy.
//!
//! Every validation failure at the registration, authorization, and token
//! endpoints maps onto the standard OAuth error object
//! (`{"error", "error_description"}`) per RFC 6749 §5.2.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the OAuth endpoints.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    /// Malformed or missing parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Unknown client or bad client credentials.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Bad, expired, or already-used code or refresh token; PKCE or
    /// redirect-URI mismatch.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// `grant_type` outside {authorization_code, refresh_token}.
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// `response_type` other than "code".
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// Unexpected internal failure during registration or issuance.
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_client(msg: impl Into<String>) -> Self {
        Self::InvalidClient(msg.into())
    }

    pub fn invalid_grant(msg: impl Into<String>) -> Self {
        Self::InvalidGrant(msg.into())
    }

    /// Wire error code for the JSON error object.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Human-readable description for the JSON error object.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(m)
            | Self::InvalidClient(m)
            | Self::InvalidGrant(m)
            | Self::UnsupportedGrantType(m)
            | Self::UnsupportedResponseType(m)
            | Self::ServerError(m) => m,
        }
    }

    /// HTTP status for this error. Client-credential failures are 401 per
    /// RFC 6749 §5.2; everything else client-side is 400.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.error_code(),
            "error_description": self.description(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
