//! In-memory credential store for clients, authorization codes, and tokens.
//!
//! One `RwLock`-guarded map per entity. Lookups of codes and tokens perform
//! lazy expiry eviction: an expired entry is deleted and reported not-found.
//! Compound sequences (code redemption, refresh rotation) run as a single
//! critical section per code/token so that two concurrent redemptions of the
//! same credential cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use super::error::{OAuthError, OAuthResult};
use super::types::{AuthCode, Client, GrantType, Token, TokenKind};
use crate::config::oauth::{
    ACCESS_TOKEN_LIFETIME, AUTH_CODE_LIFETIME, CLEANUP_INTERVAL, REFRESH_TOKEN_LIFETIME, SCOPE,
};

/// In-memory OAuth state store. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CredentialStore {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    auth_codes: Arc<RwLock<HashMap<String, AuthCode>>>,
    tokens: Arc<RwLock<HashMap<String, Token>>>,
}

/// A freshly minted access/refresh pair, as returned to the client.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub scope: String,
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            auth_codes: Arc::new(RwLock::new(HashMap::new())),
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Generate a random opaque value using two UUIDs (256 bits).
    fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    // ─── Clients ─────────────────────────────────────────────────────────────

    /// Register a new OAuth client (Dynamic Client Registration).
    ///
    /// Mints a fresh `client_id` and, unless `public` is set, a fresh
    /// `client_secret`. The returned record is the only place the secret is
    /// handed out; subsequent lookups are for validation only.
    pub async fn register_client(
        &self,
        name: Option<String>,
        redirect_uris: Vec<String>,
        grant_types: Vec<GrantType>,
        public: bool,
    ) -> OAuthResult<Client> {
        if redirect_uris.is_empty() {
            return Err(OAuthError::invalid_request("redirect_uris is required"));
        }

        let client = Client {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            client_secret: if public { None } else { Some(Self::generate_token()) },
            name,
            redirect_uris,
            grant_types,
            created_at: chrono::Utc::now(),
        };

        self.clients.write().await.insert(client.client_id.clone(), client.clone());
        Ok(client)
    }

    /// Seed a pre-configured client, e.g. the static client from the
    /// environment. An empty `redirect_uris` set means any redirect URI is
    /// accepted for this client, matching the hardcoded-client deployments.
    pub async fn seed_client(&self, client: Client) {
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    /// Look up a client by ID. Clients never expire.
    pub async fn get_client(&self, client_id: &str) -> Option<Client> {
        self.clients.read().await.get(client_id).cloned()
    }

    // ─── Authorization codes ─────────────────────────────────────────────────

    /// Mint and store a single-use authorization code.
    pub async fn create_auth_code(
        &self,
        client_id: String,
        redirect_uri: String,
        code_challenge: String,
        resource: String,
    ) -> String {
        let code = Self::generate_token();

        self.auth_codes.write().await.insert(
            code.clone(),
            AuthCode {
                client_id,
                redirect_uri,
                code_challenge,
                resource,
                expires_at: Instant::now() + AUTH_CODE_LIFETIME,
                used: false,
            },
        );

        code
    }

    /// Redeem an authorization code under a single critical section.
    ///
    /// The code must exist, be unused, and be unexpired (expired codes are
    /// deleted on discovery). `validate` then runs against the stored record
    /// while the lock is held; only if it passes is the code marked used.
    /// A failed validation leaves the code unconsumed so the client can
    /// retry with corrected parameters, but two concurrent redemptions can
    /// never both pass: the loser observes `used` and gets `invalid_grant`.
    pub async fn consume_auth_code<F>(&self, code: &str, validate: F) -> OAuthResult<AuthCode>
    where
        F: FnOnce(&AuthCode) -> OAuthResult<()>,
    {
        let mut codes = self.auth_codes.write().await;

        let Some(mut auth_code) = codes.remove(code) else {
            return Err(OAuthError::invalid_grant("unknown authorization code"));
        };
        if auth_code.is_expired() {
            // Leave it removed: expiry evicts.
            return Err(OAuthError::invalid_grant("authorization code expired"));
        }
        if auth_code.used {
            codes.insert(code.to_owned(), auth_code);
            return Err(OAuthError::invalid_grant("authorization code already used"));
        }

        if let Err(err) = validate(&auth_code) {
            codes.insert(code.to_owned(), auth_code);
            return Err(err);
        }

        auth_code.used = true;
        codes.insert(code.to_owned(), auth_code.clone());
        Ok(auth_code)
    }

    // ─── Tokens ──────────────────────────────────────────────────────────────

    /// Mint, store, and return a fresh access/refresh token pair.
    pub async fn create_token_pair(&self, client_id: &str, resource: &str) -> TokenPair {
        let mut tokens = self.tokens.write().await;
        Self::mint_pair(&mut tokens, client_id, resource)
    }

    /// Insert a new pair into an already-locked token map. Kept separate so
    /// refresh rotation can delete and re-mint under one lock.
    fn mint_pair(
        tokens: &mut HashMap<String, Token>,
        client_id: &str,
        resource: &str,
    ) -> TokenPair {
        let access = Self::generate_token();
        let refresh = Self::generate_token();
        let now = Instant::now();

        tokens.insert(
            access.clone(),
            Token {
                kind: TokenKind::Access,
                client_id: client_id.to_owned(),
                resource: resource.to_owned(),
                scope: SCOPE.to_owned(),
                expires_at: now + ACCESS_TOKEN_LIFETIME,
                paired_value: refresh.clone(),
            },
        );
        tokens.insert(
            refresh.clone(),
            Token {
                kind: TokenKind::Refresh,
                client_id: client_id.to_owned(),
                resource: resource.to_owned(),
                scope: SCOPE.to_owned(),
                expires_at: now + REFRESH_TOKEN_LIFETIME,
                paired_value: access.clone(),
            },
        );

        TokenPair {
            access_token: access,
            refresh_token: refresh,
            expires_in: ACCESS_TOKEN_LIFETIME.as_secs(),
            scope: SCOPE.to_owned(),
        }
    }

    /// Validate a bearer access token against the expected audience.
    ///
    /// Expired tokens are evicted and reported not-found. A refresh token
    /// presented as a bearer credential is rejected without eviction.
    pub async fn validate_access_token(
        &self,
        value: &str,
        expected_resource: &str,
    ) -> Option<Token> {
        let mut tokens = self.tokens.write().await;
        let token = tokens.get(value)?;

        if token.is_expired() {
            tokens.remove(value);
            return None;
        }
        if token.kind != TokenKind::Access || token.resource != expected_resource {
            return None;
        }
        Some(token.clone())
    }

    /// Rotate a refresh token: invalidate the old pair, mint a new one.
    ///
    /// Runs under a single write lock so the delete-and-reissue is atomic
    /// from any observer's perspective; the old values never validate again
    /// and a concurrent second refresh of the same token loses with
    /// `invalid_grant`.
    pub async fn refresh_token_pair(
        &self,
        refresh_token: &str,
        resource_override: Option<&str>,
    ) -> OAuthResult<TokenPair> {
        let mut tokens = self.tokens.write().await;

        let Some(old) = tokens.remove(refresh_token) else {
            return Err(OAuthError::invalid_grant("unknown refresh token"));
        };
        if old.kind != TokenKind::Refresh {
            // An access token was presented; put it back untouched.
            tokens.insert(refresh_token.to_owned(), old);
            return Err(OAuthError::invalid_grant("not a refresh token"));
        }
        if old.is_expired() {
            tokens.remove(&old.paired_value);
            return Err(OAuthError::invalid_grant("refresh token expired"));
        }

        tokens.remove(&old.paired_value);

        let resource = resource_override.unwrap_or(&old.resource);
        Ok(Self::mint_pair(&mut tokens, &old.client_id, resource))
    }

    // ─── Maintenance ─────────────────────────────────────────────────────────

    /// Start the background sweep of expired codes and tokens.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }

    async fn cleanup_expired(&self) {
        {
            let mut codes = self.auth_codes.write().await;
            codes.retain(|_, code| !code.is_expired() && !code.used);
        }
        {
            let mut tokens = self.tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired());
            let removed = before - tokens.len();
            if removed > 0 {
                tracing::debug!(count = removed, "Cleaned up expired tokens");
            }
        }
    }

    /// Force a stored token or code to be expired. Test hook.
    #[cfg(test)]
    async fn expire(&self, value: &str) {
        use std::time::Duration;
        let past = Instant::now() - Duration::from_secs(1);
        if let Some(token) = self.tokens.write().await.get_mut(value) {
            token.expires_at = past;
        }
        if let Some(code) = self.auth_codes.write().await.get_mut(value) {
            code.expires_at = past;
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish()
    }
}
