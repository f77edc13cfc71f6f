//! Keycloak integration
//!
//! `KeycloakApi` is the seam the services depend on; `KeycloakClient`
//! implements it over HTTP.

mod client;
mod types;

pub use client::{backoff_delay, upstream_error, KeycloakClient};
pub use types::*;

use crate::domain::TokenResponse;
use crate::error::Result;
use async_trait::async_trait;

/// Operations the gateway performs against a Keycloak realm
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeycloakApi: Send + Sync {
    /// Create an enabled, verified user whose username is the e-mail's local part
    async fn add_user(&self, email: &str, password: &str, service_token: &str) -> Result<()>;

    async fn get_user(&self, user_id: &str, service_token: &str) -> Result<KeycloakUser>;

    async fn get_user_roles(
        &self,
        user_id: &str,
        service_token: &str,
    ) -> Result<KeycloakRoleMappingResponse>;

    /// Password grant for an end user
    async fn authenticate_user(&self, username: &str, password: &str) -> Result<TokenResponse>;

    /// Refresh grant; never retried since refresh tokens may be single-use
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Password grant with the admin service account
    async fn fetch_service_token(&self) -> Result<TokenResponse>;

    /// Client whose roles are reported to users
    fn client_id(&self) -> String;
}
