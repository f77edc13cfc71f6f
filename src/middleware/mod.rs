//! HTTP middleware for Individuals API
//!
//! - `AuthUser` extractor validating bearer tokens
//! - request id propagation and HTTP metrics
//! - JSON normalization of framework error responses

pub mod auth;
pub mod error_response;
pub mod metrics;

pub use auth::{AuthUser, ROLE_INDIVIDUALS_ADMIN, ROLE_INDIVIDUALS_USER};
pub use error_response::normalize_error_response;
pub use metrics::ObservabilityLayer;
