//! Shared test infrastructure
//!
//! `TestApp` drives the production router against a wiremock-backed
//! Keycloak. Access tokens are signed with a throwaway RSA key whose public
//! half is published through the mocked certs endpoint.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use individuals_api::config::{Config, KeycloakConfig, RetryConfig};
use individuals_api::server::{build_router, AppState};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::{pkcs1::EncodeRsaPrivateKey, pkcs8::LineEnding, traits::PublicKeyParts, RsaPrivateKey};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REALM: &str = "individuals";
pub const CLIENT_ID: &str = "individuals-api";
pub const KEY_ID: &str = "test-key-1";
pub const TOKEN_PATH: &str = "/realms/individuals/protocol/openid-connect/token";
pub const CERTS_PATH: &str = "/realms/individuals/protocol/openid-connect/certs";
pub const USERS_PATH: &str = "/admin/realms/individuals/users";

// ============================================================================
// Mock Keycloak
// ============================================================================

/// Wiremock server answering like a Keycloak realm
pub struct MockKeycloakServer {
    pub server: MockServer,
}

impl MockKeycloakServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Realm signing keys
    pub async fn mock_certs(&self) {
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
            .mount(&self.server)
            .await;
    }

    /// Password grant for the admin service account
    pub async fn mock_service_token(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
            .mount(&self.server)
            .await;
    }

    /// Password grant for `username`
    pub async fn mock_user_login(&self, username: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains(format!("username={}", username)))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
            .mount(&self.server)
            .await;
    }

    /// Password grant rejected with `invalid_grant`
    pub async fn mock_login_rejected(&self, username: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains(format!("username={}", username)))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid user credentials"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_refresh(&self, refresh_token: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!("refresh_token={}", refresh_token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
            .mount(&self.server)
            .await;
    }

    /// Admin API user creation, authorized by `service_token`
    pub async fn mock_create_user(&self, service_token: &str, status: u16) {
        let template = if status == 201 {
            ResponseTemplate::new(201)
        } else {
            ResponseTemplate::new(status)
                .set_body_json(json!({ "errorMessage": "User exists with same username" }))
        };

        Mock::given(method("POST"))
            .and(path(USERS_PATH))
            .and(header_eq("authorization", format!("Bearer {}", service_token).as_str()))
            .respond_with(template)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_get_user(&self, user_id: &str, email: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", USERS_PATH, user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "username": email.split('@').next().unwrap_or(email),
                "email": email,
                "enabled": true,
                "emailVerified": false,
                "createdTimestamp": 1_700_000_000_000i64
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_get_user_roles(&self, user_id: &str, roles: &[&str]) {
        let mappings: Vec<Value> = roles
            .iter()
            .map(|name| {
                json!({
                    "id": format!("role-{}", name),
                    "name": name,
                    "composite": false,
                    "clientRole": true,
                    "containerId": "client-uuid"
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("{}/{}/role-mappings", USERS_PATH, user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "realmMappings": [{ "id": "r1", "name": "offline_access" }],
                "clientMappings": {
                    CLIENT_ID: {
                        "id": "client-uuid",
                        "client": CLIENT_ID,
                        "mappings": mappings
                    }
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received on `request_path`
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

pub fn token_body(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "expires_in": 300,
        "refresh_expires_in": 1800,
        "refresh_token": format!("{}-refresh", access_token),
        "token_type": "Bearer",
        "not-before-policy": 0,
        "scope": "profile email"
    })
}

// ============================================================================
// Signing keys and tokens
// ============================================================================

fn signing_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key")
    })
}

/// JWKS exposing the test signing key under `KEY_ID`
pub fn jwks() -> Value {
    let public_key = signing_key().to_public_key();
    json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": KEY_ID,
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }]
    })
}

/// Claims of a realm access token for `sub` holding `roles` on the API client
pub fn access_claims(issuer: &str, sub: &str, roles: &[&str]) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": sub,
        "iss": issuer,
        "iat": now,
        "exp": now + 300,
        "email": "john.doe@example.com",
        "preferred_username": "john.doe",
        "realm_access": { "roles": ["offline_access"] },
        "resource_access": { CLIENT_ID: { "roles": roles } }
    })
}

/// Sign `claims` with the test key, under `kid`
pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    let pem = signing_key()
        .to_pkcs1_pem(LineEnding::LF)
        .expect("encode private key");
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("load private key");

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &key).expect("sign token")
}

pub fn sign(claims: &Value) -> String {
    sign_with_kid(claims, KEY_ID)
}

// ============================================================================
// Application under test
// ============================================================================

pub struct TestApp {
    pub keycloak: MockKeycloakServer,
    pub router: Router,
    pub config: Config,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let keycloak = MockKeycloakServer::new().await;
        let config = test_config(&keycloak.uri());
        Self::with_config(keycloak, config)
    }

    /// App whose Keycloak settings point at `keycloak_url` instead of the mock
    pub async fn spawn_with_keycloak_url(keycloak_url: &str) -> Self {
        let keycloak = MockKeycloakServer::new().await;
        Self::with_config(keycloak, test_config(keycloak_url))
    }

    fn with_config(keycloak: MockKeycloakServer, config: Config) -> Self {
        let state = AppState::new(config.clone(), None).expect("build app state");

        Self {
            router: build_router(state),
            keycloak,
            config,
        }
    }

    pub fn issuer(&self) -> String {
        self.config.jwt.issuer.clone()
    }

    /// Valid access token for `sub` with the given client roles
    pub fn token_for(&self, sub: &str, roles: &[&str]) -> String {
        sign(&access_claims(&self.issuer(), sub, roles))
    }
}

/// Config pointing at `keycloak_url` with fast retries
pub fn test_config(keycloak_url: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("KEYCLOAK_URL", keycloak_url.to_string()),
        ("KEYCLOAK_REALM", REALM.to_string()),
        ("KEYCLOAK_CLIENT_ID", CLIENT_ID.to_string()),
        ("KEYCLOAK_CLIENT_SECRET", "client-secret".to_string()),
        ("KEYCLOAK_ADMIN_USERNAME", "admin".to_string()),
        ("KEYCLOAK_ADMIN_PASSWORD", "admin-password".to_string()),
        ("KEYCLOAK_TIMEOUT_SECS", "5".to_string()),
        ("KEYCLOAK_RETRY_MAX_ATTEMPTS", "2".to_string()),
        ("KEYCLOAK_RETRY_BASE_DELAY_MS", "1".to_string()),
        ("METRICS_ENABLED", "false".to_string()),
        ("SWAGGER_UI_ENABLED", "false".to_string()),
        ("READINESS_TIMEOUT_MS", "500".to_string()),
    ]);

    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

/// Nothing listens on port 1
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

/// Keycloak settings for driving `KeycloakClient` directly
pub fn keycloak_config(keycloak_url: &str, max_attempts: u32) -> KeycloakConfig {
    KeycloakConfig {
        url: keycloak_url.to_string(),
        realm: REALM.to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: "client-secret".to_string(),
        admin_username: "admin".to_string(),
        admin_password: "admin-password".to_string(),
        timeout_secs: 5,
        retry: RetryConfig {
            max_attempts,
            base_delay_ms: 1,
        },
    }
}

// ============================================================================
// HTTP Test Helpers
// ============================================================================

async fn send<R: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, Option<R>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    if body_bytes.is_empty() {
        return (status, None);
    }

    match serde_json::from_slice(&body_bytes) {
        Ok(data) => (status, Some(data)),
        Err(_) => (status, None),
    }
}

/// Make a GET request and parse JSON response
pub async fn get_json<R: DeserializeOwned>(app: &Router, path: &str) -> (StatusCode, Option<R>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Make an authenticated GET request and parse JSON response
pub async fn get_json_with_auth<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: &str,
) -> (StatusCode, Option<R>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Make a POST request with JSON body and parse JSON response
pub async fn post_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    body: &T,
) -> (StatusCode, Option<R>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// POST a raw body, for malformed-input cases
pub async fn post_raw<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    body: &str,
) -> (StatusCode, Option<R>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}
