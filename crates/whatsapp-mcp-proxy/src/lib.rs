//! WhatsApp MCP OAuth Proxy
//!
//! An OAuth 2.1 authorization server and reverse proxy that gates access to
//! a backend MCP tool-invocation service (the WhatsApp bridge). Clients
//! register (or use pre-seeded credentials), complete the Authorization
//! Code flow with mandatory PKCE, and present bearer tokens on every call
//! to the proxied `/messages` endpoint. Streaming backend responses pass
//! through unbuffered.
//!
//! # Example
//!
//! ```no_run
//! use whatsapp_mcp_proxy::{config::Config, server::ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     ProxyServer::new(config).run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;

pub use config::Config;
pub use error::ProxyError;
pub use server::ProxyServer;
pub use server::oauth::{CredentialStore, OAuthError};
