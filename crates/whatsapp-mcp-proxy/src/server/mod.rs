//! The OAuth proxy server.
//!
//! Wires the credential store, the OAuth endpoints, the bearer gate, and
//! the reverse proxy into one axum application.

pub mod auth;
pub mod oauth;
pub mod proxy;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use oauth::CredentialStore;
use oauth::types::{Client, GrantType};
pub use transport::{HttpState, create_router};

use crate::config::Config;

/// OAuth authorization server and reverse proxy for the MCP backend.
pub struct ProxyServer {
    config: Config,
    store: Arc<CredentialStore>,
}

impl ProxyServer {
    /// Create a new server with an empty credential store.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, store: Arc::new(CredentialStore::new()) }
    }

    /// Run the HTTP server until shutdown.
    ///
    /// Seeds the static client from configuration (if any), starts the
    /// background expiry sweep, and serves until SIGINT.
    ///
    /// # Errors
    ///
    /// Returns error if the listen address cannot be bound or the server
    /// fails while running.
    pub async fn run(self) -> anyhow::Result<()> {
        seed_static_client(&self.config, &self.store).await;
        Arc::clone(&self.store).start_cleanup_task();

        let addr: SocketAddr =
            format!("{}:{}", self.config.host, self.config.port).parse()?;

        tracing::info!(issuer = %self.config.base_url, "OAuth issuer identity");
        tracing::info!(backend = %self.config.backend_url, "MCP backend");
        tracing::info!(oauth_enabled = self.config.oauth_enabled, "OAuth enforcement");

        let router = create_router(self.config, self.store);
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Proxy listening on http://{addr}");

        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Proxy shut down");
        Ok(())
    }

    /// Access the credential store, e.g. for pre-seeding in tests.
    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer").field("base_url", &self.config.base_url).finish()
    }
}

/// Store the configured static client as an ordinary client record, so the
/// pre-configured and dynamically-registered paths share one code path.
/// An empty `redirect_uris` set means any redirect URI is accepted.
pub async fn seed_static_client(config: &Config, store: &CredentialStore) {
    let Some(ref client_id) = config.static_client_id else {
        return;
    };

    store
        .seed_client(Client {
            client_id: client_id.clone(),
            client_secret: config.static_client_secret.clone(),
            name: Some("static client".to_string()),
            redirect_uris: Vec::new(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            created_at: chrono::Utc::now(),
        })
        .await;

    tracing::info!(client_id = %client_id, "Seeded static OAuth client");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Received shutdown signal");
}
