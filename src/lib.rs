//! Individuals API - authentication gateway
//!
//! This crate exposes registration, login, token refresh and profile lookup
//! for end users of a Keycloak realm, validating bearer tokens as an OAuth2
//! resource server.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod keycloak;
pub mod middleware;
pub mod openapi;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
