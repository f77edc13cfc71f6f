//! Keycloak HTTP client
//!
//! Talks to the realm's OpenID Connect token endpoint and the Admin REST API.
//! Transport failures are retried with exponential backoff; HTTP error
//! statuses are mapped to `AppError::Keycloak` and never retried.

use crate::config::{KeycloakConfig, RetryConfig};
use crate::domain::TokenResponse;
use crate::error::{AppError, Result};
use anyhow::Context;
use async_trait::async_trait;
use metrics::{counter, histogram};
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::*;
use super::KeycloakApi;

/// Keycloak client backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct KeycloakClient {
    config: KeycloakConfig,
    http_client: Client,
}

impl KeycloakClient {
    /// Create a new Keycloak client
    pub fn new(config: KeycloakConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    /// Send a request, retrying transport failures when `retry` is set.
    ///
    /// Non-2xx answers come back as `AppError::Keycloak`, exhausted
    /// transport failures as `AppError::Unavailable`.
    async fn execute<F>(&self, operation: &'static str, retry: bool, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let start = Instant::now();
        debug!(operation, "Keycloak request started");

        let outcome = match self.send(operation, retry, &build).await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(map_error_response(response).await),
            Err(e) => Err(e),
        };

        let result = match &outcome {
            Ok(_) => "success",
            Err(AppError::Unavailable(_)) => "unavailable",
            Err(_) => "error",
        };
        counter!("individuals_keycloak_requests_total", "operation" => operation, "result" => result)
            .increment(1);
        histogram!("individuals_keycloak_request_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        match &outcome {
            Ok(response) => debug!(operation, status = %response.status(), "Keycloak request succeeded"),
            Err(e) => warn!(operation, error = %e, "Keycloak request failed"),
        }

        outcome
    }

    async fn send<F>(&self, operation: &'static str, retry: bool, build: &F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let max_retries = if retry { self.config.retry.max_attempts } else { 0 };
        let mut attempt = 0;

        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(&self.config.retry, attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Keycloak unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(AppError::Unavailable(e.to_string())),
            }
        }
    }

    async fn token_grant(
        &self,
        operation: &'static str,
        retry: bool,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        let url = self.config.token_url();
        let response = self
            .execute(operation, retry, || self.http_client.post(&url).form(form))
            .await?;
        let token: TokenResponse = parse_json(response, operation).await?;
        debug!(operation, "Token issued ({})", token.log_summary());
        Ok(token)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse Keycloak response for {}", operation))
        .map_err(AppError::from)
}

async fn map_error_response(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    upstream_error(status, &body)
}

/// Translate a Keycloak error answer into an `AppError::Keycloak`
///
/// The message prefers the OAuth2 `error`/`error_description` pair, then the
/// Admin API `errorMessage`, then the raw body, then the status reason.
pub fn upstream_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<KeycloakError>(body)
        .ok()
        .and_then(|e| e.message())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Keycloak request failed")
                .to_string()
        });

    AppError::Keycloak {
        status: status.as_u16(),
        message,
    }
}

/// `base_delay * 2^attempt` plus up to 50% jitter
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let base = retry
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(16));
    let jitter = if base >= 2 {
        rand::thread_rng().gen_range(0..=base / 2)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(jitter))
}

#[async_trait]
impl KeycloakApi for KeycloakClient {
    async fn add_user(&self, email: &str, password: &str, service_token: &str) -> Result<()> {
        let url = self.config.users_url();
        let body = KeycloakUserRequest::new_individual(email, password);

        self.execute("add_user", true, || {
            self.http_client
                .post(&url)
                .bearer_auth(service_token)
                .json(&body)
        })
        .await?;

        info!(username = %body.username, "Created Keycloak user");
        Ok(())
    }

    async fn get_user(&self, user_id: &str, service_token: &str) -> Result<KeycloakUser> {
        let url = self.config.user_url(user_id);
        let response = self
            .execute("get_user", true, || {
                self.http_client.get(&url).bearer_auth(service_token)
            })
            .await?;
        parse_json(response, "get_user").await
    }

    async fn get_user_roles(
        &self,
        user_id: &str,
        service_token: &str,
    ) -> Result<KeycloakRoleMappingResponse> {
        let url = self.config.user_role_mappings_url(user_id);
        let response = self
            .execute("get_user_roles", true, || {
                self.http_client.get(&url).bearer_auth(service_token)
            })
            .await?;
        parse_json(response, "get_user_roles").await
    }

    async fn authenticate_user(&self, username: &str, password: &str) -> Result<TokenResponse> {
        self.token_grant(
            "authenticate_user",
            true,
            &[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ],
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.token_grant(
            "refresh_token",
            false,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ],
        )
        .await
    }

    async fn fetch_service_token(&self) -> Result<TokenResponse> {
        self.authenticate_user(&self.config.admin_username, &self.config.admin_password)
            .await
    }

    fn client_id(&self) -> String {
        self.config.client_id.clone()
    }
}
