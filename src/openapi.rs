//! OpenAPI 3 document assembly
//!
//! Collects the handler path annotations and DTO schemas. Served at
//! `/v3/api-docs`, with Swagger UI when enabled.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Individuals API",
        version = "0.1.0",
        description = "Registration, login and profile of individuals backed by Keycloak",
        contact(name = "Individuals Team")
    ),
    tags(
        (name = "Authentication", description = "Registration, login, token refresh and profile"),
        (name = "System", description = "Health checks and metrics"),
    ),
    components(
        schemas(
            crate::domain::UserRegistrationRequest,
            crate::domain::UserLoginRequest,
            crate::domain::TokenRefreshRequest,
            crate::domain::TokenResponse,
            crate::domain::UserInfoResponse,
            crate::domain::ErrorResponse,
            crate::api::health::HealthResponse,
        )
    ),
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::refresh_token,
        crate::api::auth::me,
        crate::api::health::health,
        crate::api::health::ready,
        crate::api::metrics::metrics_handler,
    ),
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Document with the bearer JWT security scheme registered
    pub fn build() -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        if let Some(c) = doc.components.as_mut() {
            c.security_schemes.insert(
                "bearer_jwt".to_string(),
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
        doc
    }
}
