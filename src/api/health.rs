//! Health check endpoints

use crate::state::HasServices;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "UP" or "DOWN"
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/actuator/health",
    tag = "System",
    responses((status = 200, description = "Service is alive", body = HealthResponse))
)]
/// Liveness check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::new("UP"))
}

#[utoipa::path(
    get,
    path = "/actuator/health/readiness",
    tag = "System",
    responses(
        (status = 200, description = "Keycloak reachable", body = HealthResponse),
        (status = 503, description = "Service token unavailable or too slow", body = HealthResponse)
    )
)]
/// Readiness: a service token can be obtained from Keycloak in time
pub async fn ready<S: HasServices>(State(state): State<S>) -> (StatusCode, Json<HealthResponse>) {
    let timeout = state.config().readiness_timeout();
    let down = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse::new("DOWN")),
    );

    match tokio::time::timeout(timeout, state.token_service().get_service_token()).await {
        Ok(Ok(_)) => (StatusCode::OK, Json(HealthResponse::new("UP"))),
        Ok(Err(e)) => {
            tracing::warn!("Readiness check failed: {}", e);
            down
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Readiness check timed out"
            );
            down
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_up() {
        let Json(body) = health().await;
        assert_eq!(body.status, "UP");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_health_response_serialization() {
        let json = serde_json::to_string(&HealthResponse::new("DOWN")).unwrap();
        assert!(json.contains("\"status\":\"DOWN\""));
        assert!(json.contains(env!("CARGO_PKG_VERSION")));
    }
}
