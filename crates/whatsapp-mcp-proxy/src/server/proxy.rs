//! Authenticated reverse proxy to the MCP backend.
//!
//! Replays method, headers, and body against the backend base URL and
//! relays the response unchanged. Event-stream responses are forwarded
//! incrementally; the proxy never buffers a live stream.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::{HttpState, auth};
use crate::error::{ProxyError, ProxyResult};

/// Hop-by-hop headers that must not be forwarded in either direction
/// (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Build the shared outbound client for the backend hop.
///
/// No global request timeout: that would cut off long-lived event streams.
/// The header-arrival timeout is enforced per request in [`forward`].
pub fn build_backend_client(connect_timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_default()
}

/// `GET`/`POST /messages`
///
/// The protected endpoint. Bearer authentication first (unless disabled),
/// then a single forwarding hop. No retries: a backend failure is the
/// caller's signal, not ours to mask.
pub async fn handle_messages(State(state): State<Arc<HttpState>>, req: Request) -> Response {
    match auth::authenticate(&state, req.headers()).await {
        Ok(Some(token)) => {
            tracing::debug!(client_id = %token.client_id, "Authenticated proxy request");
        }
        Ok(None) => {}
        Err(err) => return auth::challenge_response(&state, &err),
    }

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ProxyError::BadRequest(format!("failed to read request body: {e}"))
                .into_response();
        }
    };

    match forward(&state, parts.method, "/messages", &parts.headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// `OPTIONS /messages`
///
/// CORS preflight; 200 with no body, no authentication required.
pub async fn handle_messages_preflight() -> StatusCode {
    StatusCode::OK
}

/// Forward one request to the backend and translate the response.
///
/// The timeout covers connection and response headers only; once headers
/// have arrived, a streaming body flows for as long as both sides keep the
/// connection open. If the caller disconnects mid-stream, axum drops the
/// body and the upstream read stops with it.
pub async fn forward(
    state: &HttpState,
    method: Method,
    path: &str,
    headers: &HeaderMap,
    body: axum::body::Bytes,
) -> ProxyResult<Response> {
    let url = format!("{}{}", state.config.backend_url, path);
    let timeout = state.config.backend_timeout;

    let mut outbound = HeaderMap::new();
    for (name, value) in headers {
        if name == header::HOST || name == header::CONTENT_LENGTH || HOP_BY_HOP.contains(name) {
            continue;
        }
        outbound.insert(name.clone(), value.clone());
    }

    let request = state
        .backend
        .request(method, &url)
        .headers(outbound)
        .body(body);

    let upstream = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| ProxyError::Timeout(timeout))?
        .map_err(|e| ProxyError::from_reqwest(&e, timeout))?;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if name == header::CONTENT_LENGTH || HOP_BY_HOP.contains(name) {
            continue;
        }
        response_headers.insert(name.clone(), value.clone());
    }

    let is_event_stream = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/event-stream"));

    let body = if is_event_stream {
        tracing::debug!(%url, "Relaying event stream from backend");
        Body::from_stream(upstream.bytes_stream())
    } else {
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| ProxyError::from_reqwest(&e, timeout))?;
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Proxy request failed");
        let code = match self {
            Self::BackendUnavailable(_) | Self::Timeout(_) => "backend_unavailable",
            Self::BadRequest(_) => "invalid_request",
        };
        let body = serde_json::json!({
            "error": code,
            "error_description": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
