//! Unified error handling for Individuals API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::domain::ErrorResponse;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned when Keycloak cannot be reached at all
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "Service Unavailable please try again later.";

/// Message returned for unexpected failures
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error occurred.";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Keycloak answered with an error status
    #[error("Keycloak error ({status}): {message}")]
    Keycloak { status: u16, message: String },

    /// Keycloak could not be reached
    #[error("Keycloak unavailable: {0}")]
    Unavailable(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status this error renders with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Keycloak { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when Keycloak rejected the bearer token we sent it
    pub fn is_upstream_unauthorized(&self) -> bool {
        matches!(self, AppError::Keycloak { status: 401, .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg) => {
                tracing::debug!("Request rejected ({}): {}", status, msg);
                msg.clone()
            }
            AppError::Keycloak { message, .. } => {
                tracing::error!("Keycloak API error ({}): {}", status, message);
                message.clone()
            }
            AppError::Unavailable(msg) => {
                tracing::error!("Keycloak request failed: {}", msg);
                SERVICE_UNAVAILABLE_MESSAGE.to_string()
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Unexpected error: {:?}", e);
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

// Field names and messages only: validator params carry the rejected value
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}
