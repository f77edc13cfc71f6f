//! Service-token cache and user token grants

use crate::domain::TokenResponse;
use crate::error::Result;
use crate::keycloak::KeycloakApi;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Safety margin subtracted from every Keycloak-reported lifetime
const EXPIRY_SKEW_SECS: i64 = 10;

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn from_response(token: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_expires_at: expires_at(now, token.expires_in),
            refresh_expires_at: expires_at(now, token.refresh_expires_in),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        }
    }

    fn access_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.access_expires_at
    }

    fn refresh_valid(&self, now: DateTime<Utc>) -> Option<&str> {
        if now < self.refresh_expires_at {
            self.refresh_token.as_deref()
        } else {
            None
        }
    }
}

/// `now + lifetime - skew`; a lifetime that does not fit a timestamp counts as expired
fn expires_at(now: DateTime<Utc>, lifetime_secs: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(lifetime_secs.saturating_sub(EXPIRY_SKEW_SECS))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

/// Keeps the admin service token fresh and issues end-user tokens
pub struct TokenService<K: KeycloakApi> {
    keycloak: Arc<K>,
    cache: RwLock<Option<CachedToken>>,
    /// Serializes renewals so concurrent callers hit Keycloak once
    renewal: Mutex<()>,
}

impl<K: KeycloakApi> TokenService<K> {
    pub fn new(keycloak: Arc<K>) -> Self {
        Self {
            keycloak,
            cache: RwLock::new(None),
            renewal: Mutex::new(()),
        }
    }

    /// Warm the cache; a failure only means the first caller fetches instead
    pub async fn init(&self) {
        match self.get_service_token().await {
            Ok(_) => info!("Service token obtained"),
            Err(e) => warn!("Could not obtain service token at startup: {}", e),
        }
    }

    /// Current service token, renewing it when expired
    pub async fn get_service_token(&self) -> Result<String> {
        if let Some(token) = self.cached_access_token().await {
            return Ok(token);
        }

        let _guard = self.renewal.lock().await;

        // Another caller may have renewed while we waited
        let snapshot = self.cache.read().await.clone();
        let now = Utc::now();

        let token = match snapshot {
            Some(cached) if cached.access_valid(now) => return Ok(cached.access_token),
            Some(cached) => match cached.refresh_valid(now) {
                Some(refresh_token) => match self.keycloak.refresh_token(refresh_token).await {
                    Ok(token) => {
                        counter!("individuals_service_token_renewals_total", "mode" => "refresh")
                            .increment(1);
                        debug!("Service token refreshed");
                        token
                    }
                    Err(e) => {
                        warn!("Service token refresh failed, fetching a new one: {}", e);
                        self.fetch().await?
                    }
                },
                None => self.fetch().await?,
            },
            None => self.fetch().await?,
        };

        let cached = CachedToken::from_response(token, Utc::now());
        let access_token = cached.access_token.clone();
        *self.cache.write().await = Some(cached);

        Ok(access_token)
    }

    /// Forget the cached service token
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn get_user_token(&self, username: &str, password: &str) -> Result<TokenResponse> {
        self.keycloak.authenticate_user(username, password).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.keycloak.refresh_token(refresh_token).await
    }

    async fn cached_access_token(&self) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.access_valid(Utc::now()))
            .map(|cached| cached.access_token.clone())
    }

    async fn fetch(&self) -> Result<TokenResponse> {
        let token = self.keycloak.fetch_service_token().await?;
        counter!("individuals_service_token_renewals_total", "mode" => "fetch").increment(1);
        debug!("Service token fetched ({})", token.log_summary());
        Ok(token)
    }
}
