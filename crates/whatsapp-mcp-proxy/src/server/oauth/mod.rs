//! OAuth 2.1 authorization server embedded in the proxy.
//!
//! Issues, validates, and rotates the credentials that gate access to the
//! proxied MCP backend.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant with mandatory refresh rotation

pub mod error;
pub mod handlers;
pub mod pkce;
pub mod store;
pub mod types;

pub use error::OAuthError;
pub use store::CredentialStore;
