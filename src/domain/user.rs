//! User profile model

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::keycloak::KeycloakUser;

/// Profile of the authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub id: String,
    pub email: Option<String>,
    /// Client roles assigned in Keycloak
    pub roles: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserInfoResponse {
    pub fn from_keycloak(user: KeycloakUser, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            roles,
            created_at: user.created_timestamp.and_then(timestamp_millis_to_utc),
        }
    }
}

/// Keycloak reports creation time in epoch milliseconds
pub fn timestamp_millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Username derived from an e-mail address: its local part
pub fn username_from_email(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}
