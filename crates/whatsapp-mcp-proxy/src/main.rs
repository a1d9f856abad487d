//! WhatsApp MCP OAuth Proxy - Entry Point

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use whatsapp_mcp_proxy::{Config, ProxyServer};

#[derive(Parser, Debug)]
#[command(name = "whatsapp-mcp-proxy")]
#[command(about = "OAuth 2.1 proxy for the WhatsApp MCP bridge")]
#[command(version)]
struct Cli {
    /// Public base URL of this proxy (issuer identity and token audience)
    #[arg(long, env = "SERVER_URL")]
    server_url: Option<String>,

    /// Base URL of the MCP backend requests are forwarded to
    #[arg(long, env = "MCP_BACKEND")]
    backend: Option<String>,

    /// Static OAuth client ID (for deployments without dynamic registration)
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: Option<String>,

    /// Static OAuth client secret
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Disable bearer-token enforcement (local/trusted deployments)
    #[arg(long)]
    no_auth: bool,

    /// Listen host
    #[arg(long, env = "PROXY_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(long, env = "PROXY_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(server_url) = cli.server_url {
        config.base_url = server_url.trim_end_matches('/').to_string();
    }
    if let Some(backend) = cli.backend {
        config.backend_url = backend.trim_end_matches('/').to_string();
    }
    if cli.client_id.is_some() {
        config.static_client_id = cli.client_id;
    }
    if cli.client_secret.is_some() {
        config.static_client_secret = cli.client_secret;
    }
    if cli.no_auth {
        config.oauth_enabled = false;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.base_url,
        backend = %config.backend_url,
        "Starting WhatsApp MCP OAuth proxy"
    );

    ProxyServer::new(config).run().await
}
