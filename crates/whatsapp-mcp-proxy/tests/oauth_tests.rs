//! Integration tests for the OAuth 2.1 endpoints.
//!
//! Drives the axum router directly: discovery → registration → authorization
//! → token exchange, plus the documented failure modes of each step.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use whatsapp_mcp_proxy::config::Config;
use whatsapp_mcp_proxy::server::create_router;
use whatsapp_mcp_proxy::server::oauth::CredentialStore;

const BASE_URL: &str = "https://proxy.example.com";
const REDIRECT_URI: &str = "https://client.example.com/cb";
const CODE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

fn build_test_router() -> axum::Router {
    let config = Config::for_testing("http://backend.unused.localhost");
    create_router(config, Arc::new(CredentialStore::new()))
}

fn code_challenge() -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(CODE_VERIFIER.as_bytes()))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Register a client and return (client_id, client_secret).
async fn register_client(app: &axum::Router) -> (String, Option<String>) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/oauth/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "client_name": "Test Client",
                        "redirect_uris": [REDIRECT_URI]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    (
        body["client_id"].as_str().unwrap().to_string(),
        body["client_secret"].as_str().map(ToString::to_string),
    )
}

/// Run the authorize step and return the issued code.
async fn authorize(app: &axum::Router, client_id: &str) -> String {
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=S256",
        code_challenge(),
    );
    let response =
        app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    let url = url::Url::parse(location).unwrap();
    url.query_pairs().find(|(k, _)| k == "code").unwrap().1.to_string()
}

async fn exchange(
    app: &axum::Router,
    params: &[(&str, &str)],
) -> (StatusCode, serde_json::Value) {
    let body_str = serde_urlencoded::to_string(params).unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::post("/oauth/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body_str))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

// ─── Discovery ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_protected_resource_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(Request::get("/.well-known/oauth-protected-resource").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["resource"], BASE_URL);
    assert!(json["authorization_servers"].as_array().unwrap().contains(&json!(BASE_URL)));
}

#[tokio::test]
async fn test_auth_server_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::get("/.well-known/oauth-authorization-server").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["issuer"], BASE_URL);
    assert_eq!(json["authorization_endpoint"], format!("{BASE_URL}/oauth/authorize"));
    assert_eq!(json["token_endpoint"], format!("{BASE_URL}/oauth/token"));
    assert_eq!(json["registration_endpoint"], format!("{BASE_URL}/oauth/register"));
    assert!(json["grant_types_supported"].as_array().unwrap().contains(&json!("refresh_token")));
    assert!(json["code_challenge_methods_supported"].as_array().unwrap().contains(&json!("S256")));
}

#[tokio::test]
async fn test_health_reports_oauth_enabled() {
    let app = build_test_router();

    let response =
        app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["oauth_enabled"], true);
}

// ─── Dynamic Client Registration ─────────────────────────────────────────────

#[tokio::test]
async fn test_register_client_returns_secret_once() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;

    assert!(!client_id.is_empty());
    assert!(secret.is_some());
}

#[tokio::test]
async fn test_register_public_client_has_no_secret() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/oauth/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "redirect_uris": [REDIRECT_URI],
                        "token_endpoint_auth_method": "none"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert!(json.get("client_secret").is_none());
    assert_eq!(json["token_endpoint_auth_method"], "none");
}

#[tokio::test]
async fn test_register_without_redirect_uris_fails() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/oauth/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"client_name": "No URIs"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_redirects_with_code_and_state() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=S256",
        code_challenge(),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    assert!(location.starts_with(REDIRECT_URI));
    assert!(location.contains("code="));
    assert!(location.contains("state=xyz"));
}

#[tokio::test]
async fn test_authorize_unknown_client() {
    let app = build_test_router();

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id=ghost\
         &redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=S256",
        code_challenge(),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorize_unregistered_redirect_uri() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fevil.example%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=S256",
        code_challenge(),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_wrong_response_type() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=token&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=S256",
        code_challenge(),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_response_type");
}

#[tokio::test]
async fn test_authorize_rejects_plain_challenge_method() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}\
         &redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb&state=xyz\
         &code_challenge={}&code_challenge_method=plain",
        code_challenge(),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
}

// ─── Token Endpoint: authorization_code grant ────────────────────────────────

#[tokio::test]
async fn test_token_exchange_happy_path() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;

    let secret = secret.unwrap();
    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", CODE_VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &secret),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    assert_eq!(json["scope"], "read write");
    assert!(json["access_token"].as_str().unwrap().len() >= 32);
    assert!(json["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn test_token_exchange_is_single_use() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;
    let secret = secret.unwrap();

    let params = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", CODE_VERIFIER),
        ("client_id", client_id.as_str()),
        ("client_secret", secret.as_str()),
    ];

    let (status, _) = exchange(&app, &params).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = exchange(&app, &params).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_exchange_missing_verifier() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;

    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", &client_id),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_token_exchange_wrong_verifier() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;
    let secret = secret.unwrap();

    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", "not-the-right-verifier-at-all-1234567890"),
            ("client_id", &client_id),
            ("client_secret", &secret),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");
    assert!(json["error_description"].as_str().unwrap().contains("PKCE"));
}

#[tokio::test]
async fn test_token_exchange_redirect_uri_mismatch() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;
    let secret = secret.unwrap();

    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "https://client.example.com/other"),
            ("code_verifier", CODE_VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &secret),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_exchange_wrong_secret() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;

    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", CODE_VERIFIER),
            ("client_id", &client_id),
            ("client_secret", "wrong-secret"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_exchange_unknown_code() {
    let app = build_test_router();
    let (client_id, _) = register_client(&app).await;

    let (status, json) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", "no-such-code"),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", CODE_VERIFIER),
            ("client_id", &client_id),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let app = build_test_router();

    let (status, json) =
        exchange(&app, &[("grant_type", "client_credentials")]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_grant_type");
}

// ─── Token Endpoint: refresh_token grant ─────────────────────────────────────

#[tokio::test]
async fn test_refresh_rotates_pair() {
    let app = build_test_router();
    let (client_id, secret) = register_client(&app).await;
    let code = authorize(&app, &client_id).await;
    let secret = secret.unwrap();

    let (_, tokens) = exchange(
        &app,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", CODE_VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &secret),
        ],
    )
    .await;
    let old_refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    let old_access = tokens["access_token"].as_str().unwrap().to_string();

    let (status, new_tokens) =
        exchange(&app, &[("grant_type", "refresh_token"), ("refresh_token", &old_refresh)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(new_tokens["access_token"], tokens["access_token"]);
    assert_ne!(new_tokens["refresh_token"], tokens["refresh_token"]);
    assert_eq!(new_tokens["expires_in"], 3600);

    // Old refresh token is dead after rotation
    let (status, json) =
        exchange(&app, &[("grant_type", "refresh_token"), ("refresh_token", &old_refresh)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");

    // So is the old access token when used as a refresh token
    let (status, _) =
        exchange(&app, &[("grant_type", "refresh_token"), ("refresh_token", &old_access)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_with_unknown_token() {
    let app = build_test_router();

    let (status, json) =
        exchange(&app, &[("grant_type", "refresh_token"), ("refresh_token", "bogus")]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_grant");
}

// ─── Protected endpoint: bearer gate ─────────────────────────────────────────

#[tokio::test]
async fn test_messages_401_without_token() {
    let app = build_test_router();

    let response =
        app.oneshot(Request::get("/messages").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
    assert!(www.contains("oauth-protected-resource"));
}

#[tokio::test]
async fn test_messages_401_with_garbage_token() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::get("/messages")
                .header("Authorization", "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_token");
}

#[tokio::test]
async fn test_messages_options_preflight() {
    let app = build_test_router();

    let response = app
        .oneshot(Request::options("/messages").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
