//! Keycloak type definitions
//!
//! Representations exchanged with the Keycloak Admin REST API and the
//! OpenID Connect token endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::username_from_email;

/// Body for creating a user through the Admin API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakUserRequest {
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub credentials: Vec<KeycloakCredential>,
}

impl KeycloakUserRequest {
    /// Self-registered user: enabled, verified, named after the e-mail's local part
    pub fn new_individual(email: &str, password: &str) -> Self {
        let username = username_from_email(email).to_string();
        Self {
            username: username.clone(),
            email: email.to_string(),
            enabled: true,
            first_name: username.clone(),
            last_name: username,
            email_verified: true,
            credentials: vec![KeycloakCredential::password(password)],
        }
    }
}

/// Keycloak credential for user creation
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakCredential {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub value: String,
    pub temporary: bool,
}

impl KeycloakCredential {
    pub fn password(value: &str) -> Self {
        Self {
            credential_type: "password".to_string(),
            value: value.to_string(),
            temporary: false,
        }
    }
}

impl std::fmt::Debug for KeycloakCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakCredential")
            .field("credential_type", &self.credential_type)
            .field("value", &"<redacted>")
            .field("temporary", &self.temporary)
            .finish()
    }
}

/// Keycloak user representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakUser {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    /// Epoch milliseconds
    pub created_timestamp: Option<i64>,
    pub enabled: Option<bool>,
    pub totp: Option<bool>,
    #[serde(default)]
    pub disableable_credential_types: Vec<String>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    pub not_before: Option<i64>,
    #[serde(default)]
    pub access: HashMap<String, bool>,
}

/// A single role mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakRoleMapping {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub composite: bool,
    #[serde(default)]
    pub client_role: bool,
    pub container_id: Option<String>,
}

/// Role mappings of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakClientMapping {
    pub id: Option<String>,
    pub client: Option<String>,
    pub mappings: Option<Vec<KeycloakRoleMapping>>,
}

/// Response of `GET /users/{id}/role-mappings`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakRoleMappingResponse {
    pub realm_mappings: Option<Vec<KeycloakRoleMapping>>,
    /// Keyed by client id
    pub client_mappings: Option<HashMap<String, KeycloakClientMapping>>,
}

/// OAuth2 error body (token endpoint) or Admin API error body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeycloakError {
    pub error: Option<String>,
    pub error_description: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl KeycloakError {
    /// `"{error}: {error_description}"` when both are present
    pub fn message(&self) -> Option<String> {
        match (&self.error, &self.error_description, &self.error_message) {
            (Some(error), Some(description), _) => Some(format!("{}: {}", error, description)),
            (Some(error), None, _) => Some(error.clone()),
            (None, _, Some(message)) => Some(message.clone()),
            (None, Some(description), None) => Some(description.clone()),
            (None, None, None) => None,
        }
    }
}

/// Role names of `client_id` in the given mappings
///
/// Missing maps, missing client entries and roles without a name all
/// contribute nothing.
pub fn extract_client_roles(
    role_mappings: Option<&KeycloakRoleMappingResponse>,
    client_id: &str,
) -> Vec<String> {
    role_mappings
        .and_then(|r| r.client_mappings.as_ref())
        .and_then(|clients| clients.get(client_id))
        .and_then(|client| client.mappings.as_ref())
        .map(|mappings| {
            mappings
                .iter()
                .filter_map(|mapping| mapping.name.clone())
                .collect()
        })
        .unwrap_or_default()
}
