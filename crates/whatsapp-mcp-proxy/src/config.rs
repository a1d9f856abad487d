//! Configuration for the WhatsApp MCP OAuth proxy.

use std::time::Duration;

/// Protocol and lifetime constants.
pub mod oauth {
    use std::time::Duration;

    /// Authorization code lifetime: 10 minutes.
    pub const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(600);

    /// Access token lifetime: 1 hour.
    pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

    /// Refresh token lifetime: 30 days.
    pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);

    /// Interval between background sweeps of expired codes and tokens.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// The only scope set this server issues.
    pub const SCOPE: &str = "read write";

    /// The only supported PKCE challenge method.
    pub const CODE_CHALLENGE_METHOD: &str = "S256";
}

/// Backend connection constants.
pub mod backend {
    use std::time::Duration;

    /// Default backend base URL (the MCP bridge).
    pub const DEFAULT_URL: &str = "http://localhost:8301";

    /// Timeout for a single proxied request. Streaming responses are exempt
    /// once headers have arrived.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this proxy; doubles as OAuth issuer identity and
    /// the default token audience.
    pub base_url: String,

    /// Base URL of the MCP backend that proxied requests are forwarded to.
    pub backend_url: String,

    /// Pre-seeded static client ID (for deployments without dynamic
    /// registration).
    pub static_client_id: Option<String>,

    /// Secret for the static client.
    pub static_client_secret: Option<String>,

    /// Whether bearer-token enforcement is active. When false, every
    /// request to the protected endpoint is treated as authenticated.
    pub oauth_enabled: bool,

    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Timeout for proxied backend requests.
    pub backend_timeout: Duration,

    /// Connection timeout for the backend.
    pub connect_timeout: Duration,
}

impl Config {
    /// Create a configuration with explicit base and backend URLs.
    ///
    /// Trailing slashes are stripped so endpoint URLs can be built by
    /// simple concatenation.
    #[must_use]
    pub fn new(base_url: &str, backend_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            static_client_id: None,
            static_client_secret: None,
            oauth_enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8300,
            backend_timeout: backend::REQUEST_TIMEOUT,
            connect_timeout: backend::CONNECT_TIMEOUT,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Recognized: `SERVER_URL`, `MCP_BACKEND`, `OAUTH_CLIENT_ID`,
    /// `OAUTH_CLIENT_SECRET`, `OAUTH_ENABLED`, `PROXY_HOST`, `PROXY_PORT`.
    ///
    /// # Errors
    ///
    /// Returns error if `PROXY_PORT` is set but not a valid port number.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let base_url =
            std::env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:8300".to_string());
        let backend_url =
            std::env::var("MCP_BACKEND").unwrap_or_else(|_| backend::DEFAULT_URL.to_string());

        let mut config = Self::new(&base_url, &backend_url);
        config.static_client_id = std::env::var("OAUTH_CLIENT_ID").ok();
        config.static_client_secret = std::env::var("OAUTH_CLIENT_SECRET").ok();
        config.oauth_enabled = std::env::var("OAUTH_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        if let Ok(host) = std::env::var("PROXY_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PROXY_PORT") {
            config.port = port.parse().map_err(|e| anyhow::anyhow!("invalid PROXY_PORT: {e}"))?;
        }

        Ok(config)
    }

    /// Create a test configuration pointing at a mock backend.
    #[must_use]
    pub fn for_testing(backend_url: &str) -> Self {
        let mut config = Self::new("https://proxy.example.com", backend_url);
        config.backend_timeout = Duration::from_secs(5);
        config.connect_timeout = Duration::from_secs(2);
        config
    }

    /// URL of the protected-resource metadata document, used in
    /// `WWW-Authenticate` challenges.
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }

    /// Check if a static client is fully configured.
    #[must_use]
    pub const fn has_static_client(&self) -> bool {
        self.static_client_id.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8300", backend::DEFAULT_URL)
    }
}
