//! Configuration management for Individuals API

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Keycloak configuration
    pub keycloak: KeycloakConfig,
    /// Bearer token validation
    pub jwt: JwtConfig,
    /// Logging, metrics and trace export
    pub telemetry: TelemetryConfig,
    /// Serve Swagger UI next to the OpenAPI document
    pub swagger_ui_enabled: bool,
    /// Upper bound for the readiness probe's service-token check
    pub readiness_timeout_ms: u64,
}

#[derive(Clone)]
pub struct KeycloakConfig {
    /// Base URL for server-to-server communication (e.g., http://keycloak:8080)
    pub url: String,
    pub realm: String,
    /// Confidential client used for password and refresh_token grants
    pub client_id: String,
    pub client_secret: String,
    /// Service account used to call the Admin API
    pub admin_username: String,
    pub admin_password: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

/// Backoff for transport-level failures talking to Keycloak
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim, unchecked when `None`
    pub audience: Option<String>,
    /// `resource_access` entry holding the user's client roles
    pub roles_client: String,
    pub jwks_cache_ttl_secs: u64,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: true,
            tracing_enabled: false,
            otlp_endpoint: None,
            service_name: "individuals-api".to_string(),
        }
    }
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl KeycloakConfig {
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.url, self.realm)
    }

    pub fn admin_url(&self) -> String {
        format!("{}/admin/realms/{}", self.url, self.realm)
    }

    pub fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/protocol/openid-connect/userinfo", self.realm_url())
    }

    pub fn certs_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.realm_url())
    }

    pub fn users_url(&self) -> String {
        format!("{}/users", self.admin_url())
    }

    pub fn user_url(&self, user_id: &str) -> String {
        format!("{}/{}", self.users_url(), urlencoding::encode(user_id))
    }

    pub fn user_role_mappings_url(&self, user_id: &str) -> String {
        format!("{}/role-mappings", self.user_url(user_id))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("{} is required", key),
            }
        };
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(default)
        };

        let keycloak = {
            let raw_url = var("KEYCLOAK_URL", "http://localhost:8081");
            url::Url::parse(&raw_url).context("Invalid KEYCLOAK_URL")?;
            let url = raw_url.trim_end_matches('/').to_string();

            let realm = var("KEYCLOAK_REALM", "individuals");
            if realm.trim().is_empty() {
                bail!("KEYCLOAK_REALM must not be blank");
            }

            KeycloakConfig {
                url,
                realm,
                client_id: required("KEYCLOAK_CLIENT_ID")?,
                client_secret: required("KEYCLOAK_CLIENT_SECRET")?,
                admin_username: required("KEYCLOAK_ADMIN_USERNAME")?,
                admin_password: required("KEYCLOAK_ADMIN_PASSWORD")?,
                timeout_secs: var("KEYCLOAK_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
                retry: RetryConfig {
                    max_attempts: var("KEYCLOAK_RETRY_MAX_ATTEMPTS", "3")
                        .parse()
                        .unwrap_or(3),
                    base_delay_ms: var("KEYCLOAK_RETRY_BASE_DELAY_MS", "1000")
                        .parse()
                        .unwrap_or(1000),
                },
            }
        };

        let jwt = JwtConfig {
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| keycloak.realm_url()),
            audience: lookup("JWT_AUDIENCE").filter(|s| !s.trim().is_empty()),
            roles_client: var("JWT_ROLES_CLIENT", "individuals-api"),
            jwks_cache_ttl_secs: var("JWT_JWKS_CACHE_TTL_SECS", "300")
                .parse()
                .unwrap_or(300),
            leeway_secs: var("JWT_LEEWAY_SECS", "5").parse().unwrap_or(5),
        };

        let telemetry = TelemetryConfig {
            log_format: var("LOG_FORMAT", "text").to_lowercase(),
            metrics_enabled: flag("METRICS_ENABLED", true),
            tracing_enabled: flag("OTEL_TRACING_ENABLED", false),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
            service_name: var("OTEL_SERVICE_NAME", "individuals-api"),
        };

        Ok(Self {
            http_host: var("HTTP_HOST", "0.0.0.0"),
            http_port: var("HTTP_PORT", "8080")
                .parse()
                .context("Invalid HTTP_PORT")?,
            keycloak,
            jwt,
            telemetry,
            swagger_ui_enabled: flag("SWAGGER_UI_ENABLED", true),
            readiness_timeout_ms: var("READINESS_TIMEOUT_MS", "3000")
                .parse()
                .unwrap_or(3000),
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}
