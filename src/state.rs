//! Application state traits for dependency injection
//!
//! Handlers are generic over `HasServices`, so the same router can be driven
//! by the production `AppState` or by a test state.

use crate::config::Config;
use crate::jwt::JwtValidator;
use crate::keycloak::KeycloakApi;
use crate::service::{TokenService, UserService};
use metrics_exporter_prometheus::PrometheusHandle;

pub trait HasServices: Clone + Send + Sync + 'static {
    /// Keycloak implementation backing the services
    type Keycloak: KeycloakApi + 'static;

    fn config(&self) -> &Config;

    fn user_service(&self) -> &UserService<Self::Keycloak>;

    /// Service-token cache, also used for readiness
    fn token_service(&self) -> &TokenService<Self::Keycloak>;

    fn jwt_validator(&self) -> &JwtValidator;

    /// `None` when metrics are disabled
    fn prometheus_handle(&self) -> Option<&PrometheusHandle>;
}
