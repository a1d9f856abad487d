//! HTTP surface of the proxy: router assembly and shared handler state.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::oauth::CredentialStore;
use super::oauth::handlers;
use super::proxy;
use crate::config::Config;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Config,
    pub store: Arc<CredentialStore>,
    /// Outbound client for the backend hop; connection pool shared across
    /// requests.
    pub backend: reqwest::Client,
}

/// Create the HTTP router.
///
/// The store is injected rather than constructed here so tests can build an
/// isolated store per case and deployments can pre-seed the static client.
pub fn create_router(config: Config, store: Arc<CredentialStore>) -> Router {
    let backend = proxy::build_backend_client(config.connect_timeout);
    let state = Arc::new(HttpState { config, store, backend });

    Router::new()
        .route("/health", get(health_check))
        // OAuth discovery
        .route(
            "/.well-known/oauth-authorization-server",
            get(handlers::handle_auth_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(handlers::handle_protected_resource),
        )
        // OAuth flow
        .route("/oauth/register", post(handlers::handle_register))
        .route("/oauth/authorize", get(handlers::handle_authorize))
        .route("/oauth/token", post(handlers::handle_token))
        // Protected, proxied endpoint
        .route(
            "/messages",
            get(proxy::handle_messages)
                .post(proxy::handle_messages)
                .options(proxy::handle_messages_preflight),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unauthenticated liveness probe.
async fn health_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "whatsapp-mcp-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": "http",
        "oauth_enabled": state.config.oauth_enabled,
    }))
}
