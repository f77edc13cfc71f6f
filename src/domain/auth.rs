//! Authentication request and token models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, Result};

/// Input for registering a new individual
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserRegistrationRequest {
    #[validate(email(message = "Invalid e-mail address"))]
    #[schema(example = "john.doe@example.com")]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "Password must be 1-255 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Password must be 1-255 characters"))]
    pub confirm_password: String,
}

impl UserRegistrationRequest {
    /// Field validation followed by the password confirmation check
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.password != self.confirm_password {
            return Err(AppError::BadRequest("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

/// Input for logging in with e-mail and password
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserLoginRequest {
    #[validate(email(message = "Invalid e-mail address"))]
    #[schema(example = "john.doe@example.com")]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "Password must be 1-255 characters"))]
    pub password: String,
}

/// Input for exchanging a refresh token
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TokenRefreshRequest {
    #[validate(length(min = 1, message = "Refresh token must not be empty"))]
    pub refresh_token: String,
}

/// Token set, shaped like the Keycloak token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Refresh token lifetime in seconds
    #[serde(default)]
    pub refresh_expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Summary safe to log: lengths only, never token material
    pub fn log_summary(&self) -> String {
        format!(
            "access_token length={}, refresh_token length={}, expires_in={}",
            self.access_token.len(),
            self.refresh_token.as_ref().map(|t| t.len()).unwrap_or(0),
            self.expires_in
        )
    }
}
