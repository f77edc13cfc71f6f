//! Bearer token validation against the realm's JWKS

use crate::config::JwtConfig;
use crate::error::{AppError, Result};
use crate::keycloak::upstream_error;
use anyhow::Context;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Minimum spacing between JWKS refreshes triggered by unknown key ids
const FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Role list claim (`realm_access`, `resource_access.{client}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims of a Keycloak access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (Keycloak user ID)
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    pub iss: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RoleClaim>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleClaim>,
}

impl AccessClaims {
    /// `ROLE_<ROLE>` for every client role granted on `roles_client`
    pub fn authorities(&self, roles_client: &str) -> Vec<String> {
        self.resource_access
            .get(roles_client)
            .map(|claim| {
                claim
                    .roles
                    .iter()
                    .map(|role| format!("ROLE_{}", role.to_uppercase()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct VerificationKey {
    key: DecodingKey,
    algorithms: Vec<Algorithm>,
}

struct KeyCache {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Instant,
}

/// Validates RS/PS/ES-signed access tokens issued by the realm
pub struct JwtValidator {
    config: JwtConfig,
    certs_url: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<KeyCache>>,
    /// Serializes refreshes; holds the time of the last one
    last_refresh: Mutex<Option<Instant>>,
}

impl JwtValidator {
    pub fn new(config: JwtConfig, certs_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            certs_url,
            http_client,
            cache: RwLock::new(None),
            last_refresh: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Verify signature, expiry, issuer and (when configured) audience
    pub async fn validate(&self, token: &str) -> Result<AccessClaims> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token has no key id".to_string()))?;

        let key = self.key_for(&kid).await?;
        if !key.algorithms.contains(&header.alg) {
            return Err(AppError::Unauthorized(
                "Token algorithm not allowed".to_string(),
            ));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.config.leeway_secs;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<AccessClaims>(token, &key.key, &validation)?;
        Ok(data.claims)
    }

    async fn key_for(&self, kid: &str) -> Result<VerificationKey> {
        if let (true, Some(key)) = self.lookup(kid).await {
            return Ok(key);
        }

        let mut last_refresh = self.last_refresh.lock().await;

        let (fresh, found) = self.lookup(kid).await;
        if let (true, Some(key)) = (fresh, found.clone()) {
            return Ok(key);
        }

        // A fresh cache that lacks the kid is only re-fetched occasionally
        let may_refresh = match *last_refresh {
            Some(at) => !fresh || at.elapsed() >= FORCED_REFRESH_INTERVAL,
            None => true,
        };

        if may_refresh {
            *last_refresh = Some(Instant::now());
            match self.fetch_keys().await {
                Ok(keys) => {
                    debug!(count = keys.len(), "JWKS refreshed");
                    *self.cache.write().await = Some(KeyCache {
                        keys,
                        fetched_at: Instant::now(),
                    });
                }
                Err(e) if found.is_some() => {
                    warn!("JWKS refresh failed, using cached keys: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        self.lookup(kid)
            .await
            .1
            .ok_or_else(|| AppError::Unauthorized("Unknown signing key".to_string()))
    }

    /// (cache is fresh, key for `kid`)
    async fn lookup(&self, kid: &str) -> (bool, Option<VerificationKey>) {
        let ttl = Duration::from_secs(self.config.jwks_cache_ttl_secs);
        let cache = self.cache.read().await;
        match cache.as_ref() {
            Some(cache) => (
                cache.fetched_at.elapsed() < ttl,
                cache.keys.get(kid).cloned(),
            ),
            None => (false, None),
        }
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, VerificationKey>> {
        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, &body));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .context("Failed to parse JWKS")?;

        Ok(signing_keys(&jwks))
    }
}

/// Signing keys of a JWKS by kid; encryption and symmetric keys are dropped
fn signing_keys(jwks: &JwkSet) -> HashMap<String, VerificationKey> {
    jwks.keys
        .iter()
        .filter(|jwk| jwk.common.public_key_use != Some(PublicKeyUse::Encryption))
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone()?;
            let algorithms = allowed_algorithms(jwk);
            if algorithms.is_empty() {
                return None;
            }
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, VerificationKey { key, algorithms })),
                Err(e) => {
                    warn!(kid = %kid, "Skipping unusable JWK: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Asymmetric algorithms the key can verify, narrowed to its `alg` when present
fn allowed_algorithms(jwk: &Jwk) -> Vec<Algorithm> {
    let by_type: Vec<Algorithm> = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => RSA_ALGORITHMS.to_vec(),
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => vec![Algorithm::ES256],
            EllipticCurve::P384 => vec![Algorithm::ES384],
            _ => vec![],
        },
        AlgorithmParameters::OctetKeyPair(_) => vec![Algorithm::EdDSA],
        _ => vec![],
    };

    match &jwk.common.key_algorithm {
        Some(declared) => match Algorithm::from_str(&format!("{:?}", declared)) {
            Ok(alg) if by_type.contains(&alg) => vec![alg],
            _ => vec![],
        },
        None => by_type,
    }
}
