//! Bearer-token gate in front of the proxied endpoint.

use axum::Json;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::HttpState;
use super::oauth::types::Token;

/// Bearer authentication failures on the protected endpoint.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or malformed `Authorization` header.
    #[error("Missing or malformed authorization header")]
    Unauthorized,

    /// The presented token is unknown, expired, or bound to a different
    /// audience.
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl AuthError {
    /// Wire error code for the `WWW-Authenticate` challenge and JSON body.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidToken => "invalid_token",
        }
    }
}

/// Validate the bearer token on an incoming request.
///
/// Returns the token record on success, or `Ok(None)` when OAuth
/// enforcement is disabled by configuration (every request then counts as
/// authenticated). Expired tokens are evicted by the store during lookup.
pub async fn authenticate(
    state: &HttpState,
    headers: &HeaderMap,
) -> Result<Option<Token>, AuthError> {
    if !state.config.oauth_enabled {
        return Ok(None);
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token_value = authorization.strip_prefix("Bearer ").ok_or(AuthError::Unauthorized)?;

    let token = state
        .store
        .validate_access_token(token_value, &state.config.base_url)
        .await
        .ok_or(AuthError::InvalidToken)?;

    Ok(Some(token))
}

/// Build the 401 response for a failed bearer check.
///
/// The `WWW-Authenticate` header names the protected-resource metadata URL
/// so compliant clients can self-discover the re-authorization flow
/// (RFC 9728 §5.1).
pub fn challenge_response(state: &HttpState, err: &AuthError) -> Response {
    let challenge = format!(
        "Bearer resource_metadata=\"{}\", error=\"{}\"",
        state.config.resource_metadata_url(),
        err.error_code(),
    );

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": err.error_code(),
            "error_description": err.to_string(),
        })),
    )
        .into_response();

    if let Ok(value) = challenge.parse() {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
