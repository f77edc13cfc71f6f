//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::jwt::JwtValidator;
use crate::keycloak::KeycloakClient;
use crate::middleware::{normalize_error_response, ObservabilityLayer};
use crate::openapi::ApiDoc;
use crate::service::{TokenService, UserService};
use crate::state::HasServices;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa_swagger_ui::SwaggerUi;

/// Upper bound for handling a single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService<KeycloakClient>>,
    pub token_service: Arc<TokenService<KeycloakClient>>,
    pub jwt_validator: Arc<JwtValidator>,
    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the Keycloak client, services and token validator
    pub fn new(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<Self> {
        let keycloak = Arc::new(KeycloakClient::new(config.keycloak.clone())?);
        let token_service = Arc::new(TokenService::new(keycloak.clone()));
        let user_service = Arc::new(UserService::new(keycloak, token_service.clone()));
        let jwt_validator = Arc::new(JwtValidator::new(
            config.jwt.clone(),
            config.keycloak.certs_url(),
            config.keycloak.timeout(),
        )?);

        Ok(Self {
            config: Arc::new(config),
            user_service,
            token_service,
            jwt_validator,
            prometheus_handle,
        })
    }
}

impl HasServices for AppState {
    type Keycloak = KeycloakClient;

    fn config(&self) -> &Config {
        &self.config
    }

    fn user_service(&self) -> &UserService<KeycloakClient> {
        &self.user_service
    }

    fn token_service(&self) -> &TokenService<KeycloakClient> {
        &self.token_service
    }

    fn jwt_validator(&self) -> &JwtValidator {
        &self.jwt_validator
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        self.prometheus_handle.as_ref()
    }
}

/// Run the server
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let http_addr = config.http_addr();
    let state = AppState::new(config, prometheus_handle)?;

    // Warm the service-token cache without delaying startup
    let token_service = state.token_service.clone();
    tokio::spawn(async move { token_service.init().await });

    let app = build_router(state);

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so tests can drive the production handlers.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        // Health and metrics
        .route("/actuator/health", get(api::health::health))
        .route("/health", get(api::health::health))
        .route("/actuator/health/readiness", get(api::health::ready::<S>))
        .route("/ready", get(api::health::ready::<S>))
        .route(
            "/actuator/prometheus",
            get(api::metrics::metrics_handler::<S>),
        )
        .route("/metrics", get(api::metrics::metrics_handler::<S>))
        // Authentication
        .route("/v1/auth/registration", post(api::auth::register::<S>))
        .route("/v1/auth/login", post(api::auth::login::<S>))
        .route("/v1/auth/refresh-token", post(api::auth::refresh_token::<S>))
        .route("/v1/auth/me", get(api::auth::me::<S>))
        .fallback(api::fallback);

    // SwaggerUi serves the document itself when mounted
    if state.config().swagger_ui_enabled {
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/v3/api-docs", ApiDoc::build()));
    } else {
        router = router.route("/v3/api-docs", get(|| async { Json(ApiDoc::build()) }));
    }

    // Innermost first; ObservabilityLayer needs the plain axum body, so it sits inside TraceLayer
    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(axum::middleware::from_fn(normalize_error_response))
        .layer(ObservabilityLayer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
