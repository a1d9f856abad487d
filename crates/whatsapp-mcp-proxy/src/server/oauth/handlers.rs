//! OAuth 2.1 endpoint handlers.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: OAuth 2.0 Authorization Code Grant with refresh rotation

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::error::{OAuthError, OAuthResult};
use super::pkce;
use super::store::TokenPair;
use super::types::GrantType;
use crate::config::oauth::CODE_CHALLENGE_METHOD;
use crate::server::HttpState;

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
///
/// Tells clients where to find the authorization server for this resource.
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resource": state.config.base_url,
        "authorization_servers": [state.config.base_url],
        "bearer_methods_supported": ["header"],
        "scopes_supported": ["read", "write"]
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
///
/// Describes the OAuth endpoints and capabilities.
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let base = &state.config.base_url;
    Json(serde_json::json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/oauth/authorize"),
        "token_endpoint": format!("{base}/oauth/token"),
        "registration_endpoint": format!("{base}/oauth/register"),
        "scopes_supported": ["read", "write"],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /oauth/register`
///
/// Register a new OAuth client dynamically. The secret in the 201 response
/// is handed out exactly once.
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let grant_types: Vec<GrantType> = if req.grant_types.is_empty() {
        vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
    } else {
        req.grant_types.iter().filter_map(|g| GrantType::parse(g)).collect()
    };
    let public = req.token_endpoint_auth_method.as_deref() == Some("none");

    let client = match state
        .store
        .register_client(req.client_name, req.redirect_uris.unwrap_or_default(), grant_types, public)
        .await
    {
        Ok(client) => client,
        Err(err) => return err.into_response(),
    };

    tracing::info!(client_id = %client.client_id, public, "Registered OAuth client");

    let mut body = serde_json::json!({
        "client_id": client.client_id,
        "client_name": client.name,
        "redirect_uris": client.redirect_uris,
        "grant_types": client.grant_types.iter().map(|g| g.as_str()).collect::<Vec<_>>(),
        "response_types": ["code"],
        "token_endpoint_auth_method": if public { "none" } else { "client_secret_post" },
        "client_id_issued_at": client.created_at.timestamp(),
    });
    if let Some(ref secret) = client.client_secret {
        body["client_secret"] = serde_json::json!(secret);
    }

    (StatusCode::CREATED, Json(body)).into_response()
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
}

/// `GET /oauth/authorize`
///
/// Auto-approve the authorization request. The proxy fronts a single
/// backend whose access is already gated server-side, so there is no
/// interactive consent step: any known client with valid PKCE parameters
/// gets a code. Failures are JSON error responses, never redirects — the
/// redirect target may itself be the invalid parameter.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    match authorize(&state, &query).await {
        Ok(redirect_url) => {
            (StatusCode::FOUND, [(header::LOCATION, redirect_url)]).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn authorize(state: &HttpState, query: &AuthorizeQuery) -> OAuthResult<String> {
    let client_id = query
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing client_id"))?;
    let redirect_uri = query
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing redirect_uri"))?;
    let code_challenge = query
        .code_challenge
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing code_challenge"))?;

    // Validation order: client, redirect URI, response type, challenge method.
    let client = state
        .store
        .get_client(client_id)
        .await
        .ok_or_else(|| OAuthError::invalid_client("unknown client_id"))?;

    if !client.redirect_uris.is_empty()
        && !client.redirect_uris.iter().any(|u| u == redirect_uri)
    {
        return Err(OAuthError::invalid_request("redirect_uri not registered for this client"));
    }

    if query.response_type.as_deref() != Some("code") {
        return Err(OAuthError::UnsupportedResponseType(
            "response_type must be 'code'".to_string(),
        ));
    }
    if query.code_challenge_method.as_deref() != Some(CODE_CHALLENGE_METHOD) {
        return Err(OAuthError::invalid_request("code_challenge_method must be 'S256'"));
    }

    // Audience defaults to this server's own identity.
    let resource = query.resource.clone().unwrap_or_else(|| state.config.base_url.clone());

    let code = state
        .store
        .create_auth_code(
            client_id.to_owned(),
            redirect_uri.to_owned(),
            code_challenge.to_owned(),
            resource,
        )
        .await;

    tracing::info!(client_id = %client_id, "Issued authorization code");

    let mut redirect_url = redirect_uri.to_owned();
    redirect_url.push_str(if redirect_url.contains('?') { "&" } else { "?" });
    redirect_url.push_str(&format!("code={code}"));
    if let Some(ref oauth_state) = query.state {
        redirect_url.push_str(&format!("&state={}", url_encode(oauth_state)));
    }
    Ok(redirect_url)
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub resource: Option<String>,
}

/// `POST /oauth/token`
///
/// Exchange an authorization code for tokens, or rotate a refresh token.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    axum::Form(form): axum::Form<TokenRequest>,
) -> Response {
    let result = match GrantType::parse(&form.grant_type) {
        Some(GrantType::AuthorizationCode) => authorization_code_grant(&state, &form).await,
        Some(GrantType::RefreshToken) => refresh_token_grant(&state, &form).await,
        None => Err(OAuthError::UnsupportedGrantType(format!(
            "unsupported grant_type '{}'",
            form.grant_type
        ))),
    };

    match result {
        Ok(pair) => token_success(&pair),
        Err(err) => {
            tracing::warn!(error = %err, grant_type = %form.grant_type, "Token request rejected");
            err.into_response()
        }
    }
}

async fn authorization_code_grant(
    state: &HttpState,
    form: &TokenRequest,
) -> OAuthResult<TokenPair> {
    let code = form.code.as_deref().ok_or_else(|| OAuthError::invalid_request("missing code"))?;
    let redirect_uri = form
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing redirect_uri"))?;
    let code_verifier = form
        .code_verifier
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing code_verifier"))?;
    let client_id = form
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing client_id"))?;

    let client = state.store.get_client(client_id).await;

    // Redeem under the store's per-code critical section. Validation order:
    // client identity, client secret, redirect URI equality, PKCE.
    let auth_code = state
        .store
        .consume_auth_code(code, |auth_code| {
            if auth_code.client_id != client_id {
                return Err(OAuthError::invalid_client("client_id does not match code"));
            }
            let client = client
                .as_ref()
                .ok_or_else(|| OAuthError::invalid_client("unknown client_id"))?;
            if client.requires_secret()
                && form.client_secret.as_deref() != client.client_secret.as_deref()
            {
                return Err(OAuthError::invalid_client("invalid client credentials"));
            }
            if auth_code.redirect_uri != redirect_uri {
                return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
            }
            if !pkce::verify_s256(code_verifier, &auth_code.code_challenge) {
                return Err(OAuthError::invalid_grant("PKCE verification failed"));
            }
            Ok(())
        })
        .await?;

    let resource = form.resource.as_deref().unwrap_or(&auth_code.resource);
    let pair = state.store.create_token_pair(&auth_code.client_id, resource).await;

    tracing::info!(client_id = %auth_code.client_id, "Issued token pair");
    Ok(pair)
}

async fn refresh_token_grant(state: &HttpState, form: &TokenRequest) -> OAuthResult<TokenPair> {
    let refresh_token = form
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("missing refresh_token"))?;

    let pair = state.store.refresh_token_pair(refresh_token, form.resource.as_deref()).await?;

    tracing::info!("Rotated token pair");
    Ok(pair)
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(pair: &TokenPair) -> Response {
    let mut response = Json(serde_json::json!({
        "access_token": pair.access_token,
        "token_type": "Bearer",
        "expires_in": pair.expires_in,
        "refresh_token": pair.refresh_token,
        "scope": pair.scope
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// Percent-encode a string for use in URL query parameters.
fn url_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}
