//! Registration, login and profile use cases

use crate::domain::{
    username_from_email, TokenRefreshRequest, TokenResponse, UserInfoResponse,
    UserLoginRequest, UserRegistrationRequest,
};
use crate::error::Result;
use crate::keycloak::{extract_client_roles, KeycloakApi};
use crate::service::TokenService;
use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct UserService<K: KeycloakApi> {
    keycloak: Arc<K>,
    tokens: Arc<TokenService<K>>,
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "failure"
    }
}

impl<K: KeycloakApi> UserService<K> {
    pub fn new(keycloak: Arc<K>, tokens: Arc<TokenService<K>>) -> Self {
        Self { keycloak, tokens }
    }

    /// Create the Keycloak user and log them in
    pub async fn register(&self, request: UserRegistrationRequest) -> Result<TokenResponse> {
        let result = self.do_register(&request).await;
        counter!("individuals_auth_registrations_total", "result" => outcome(&result))
            .increment(1);
        result
    }

    async fn do_register(&self, request: &UserRegistrationRequest) -> Result<TokenResponse> {
        request.check()?;

        let username = username_from_email(&request.email);
        info!(username, "Registering user");

        let keycloak = &self.keycloak;
        let email = request.email.as_str();
        let password = request.password.as_str();
        self.with_service_token(move |token| async move {
            keycloak.add_user(email, password, &token).await
        })
        .await?;

        let token = self.tokens.get_user_token(username, password).await?;
        info!(username, "User registered");
        Ok(token)
    }

    pub async fn login(&self, request: UserLoginRequest) -> Result<TokenResponse> {
        let result: Result<TokenResponse> = async {
            request.validate()?;
            let username = username_from_email(&request.email);
            let token = self.tokens.get_user_token(username, &request.password).await?;
            info!(username, "User logged in");
            Ok(token)
        }
        .await;
        counter!("individuals_auth_logins_total", "result" => outcome(&result)).increment(1);
        result
    }

    pub async fn refresh_token(&self, request: TokenRefreshRequest) -> Result<TokenResponse> {
        let result: Result<TokenResponse> = async {
            request.validate()?;
            self.tokens.refresh_token(&request.refresh_token).await
        }
        .await;
        counter!("individuals_auth_token_refreshes_total", "result" => outcome(&result))
            .increment(1);
        result
    }

    /// Profile and client roles of `user_id`, fetched concurrently
    pub async fn get_user_info(&self, user_id: &str) -> Result<UserInfoResponse> {
        let keycloak = &self.keycloak;
        let client_id = keycloak.client_id();

        let (user, role_mappings) = self
            .with_service_token(move |token| async move {
                tokio::try_join!(
                    keycloak.get_user(user_id, &token),
                    keycloak.get_user_roles(user_id, &token)
                )
            })
            .await?;

        let roles = extract_client_roles(Some(&role_mappings), &client_id);
        Ok(UserInfoResponse::from_keycloak(user, roles))
    }

    /// Run an Admin API call, renewing the service token once if Keycloak rejects it
    async fn with_service_token<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.tokens.get_service_token().await?;
        match call(token).await {
            Err(e) if e.is_upstream_unauthorized() => {
                warn!("Service token rejected by Keycloak, renewing");
                self.tokens.invalidate().await;
                let token = self.tokens.get_service_token().await?;
                call(token).await
            }
            other => other,
        }
    }
}
