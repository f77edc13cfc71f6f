//! REST API handlers

pub mod auth;
pub mod health;
pub mod metrics;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;

/// Unknown routes: 401 without a valid token, 404 otherwise
pub async fn fallback(_auth: AuthUser) -> Result<()> {
    Err(AppError::NotFound("Resource not found".to_string()))
}
