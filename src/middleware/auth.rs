//! Bearer authentication extractor
//!
//! `AuthUser` validates the `Authorization: Bearer` token against the realm
//! keys and exposes the caller's id and authorities to handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::jwt::AccessClaims;
use crate::state::HasServices;

/// Authority granted to realm administrators of this API
pub const ROLE_INDIVIDUALS_ADMIN: &str = "ROLE_INDIVIDUALS_ADMIN";
/// Authority granted to regular users of this API
pub const ROLE_INDIVIDUALS_USER: &str = "ROLE_INDIVIDUALS_USER";

/// Authenticated caller extracted from a validated access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Keycloak user id (`sub`)
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// `ROLE_*` authorities derived from the client roles
    pub authorities: Vec<String>,
}

impl AuthUser {
    pub fn from_claims(claims: AccessClaims, roles_client: &str) -> Self {
        let authorities = claims.authorities(roles_client);
        Self {
            user_id: claims.sub,
            email: claims.email,
            username: claims.preferred_username,
            authorities,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// 403 unless the caller holds at least one of `authorities`
    pub fn require_any_authority(&self, authorities: &[&str]) -> Result<(), AppError> {
        if authorities.iter().any(|a| self.has_authority(a)) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

async fn extract_bearer_token<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
) -> Result<String, AppError> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                if e.is_missing() {
                    AppError::Unauthorized("Missing authorization token".to_string())
                } else {
                    AppError::Unauthorized("Invalid authorization header".to_string())
                }
            })?;

    let token = bearer.token().trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized(
            "Invalid authorization header".to_string(),
        ));
    }
    Ok(token.to_string())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: HasServices + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts, state).await?;
        let validator = state.jwt_validator();

        let claims = validator.validate(&token).await.map_err(|e| match e {
            // Key server trouble is not the caller's fault
            AppError::Unavailable(_) | AppError::Internal(_) => e,
            other => {
                tracing::debug!("Bearer token rejected: {}", other);
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
        })?;

        Ok(AuthUser::from_claims(claims, &validator.config().roles_client))
    }
}
