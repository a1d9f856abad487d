//! OAuth 2.1 entity types: clients, authorization codes, tokens.

use std::time::Instant;

/// Grant types a client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    /// Parse the form-encoded `grant_type` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// The wire name of this grant type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A registered OAuth client, either dynamically registered or pre-seeded
/// from configuration. Immutable once stored.
#[derive(Debug, Clone)]
pub struct Client {
    pub client_id: String,
    /// Absent for public clients (`token_endpoint_auth_method: "none"`).
    pub client_secret: Option<String>,
    pub name: Option<String>,
    /// Non-empty; validated at registration.
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Client {
    /// Whether the client must present its secret at the token endpoint.
    #[must_use]
    pub const fn requires_secret(&self) -> bool {
        self.client_secret.is_some()
    }
}

/// A single-use authorization code bound to a PKCE challenge, redirect URI,
/// and token audience.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    /// Audience the eventual tokens are valid for.
    pub resource: String,
    pub expires_at: Instant,
    pub used: bool,
}

impl AuthCode {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Discriminates the two halves of a token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// An issued bearer credential. Access and refresh tokens share this shape;
/// `paired_value` holds the counterpart token's value for pair-wise
/// invalidation on rotation.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub client_id: String,
    /// Audience this token is valid for.
    pub resource: String,
    pub scope: String,
    pub expires_at: Instant,
    /// Value of the other token in the pair. Lookup field only; the store
    /// owns both records.
    pub paired_value: String,
}

impl Token {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}
