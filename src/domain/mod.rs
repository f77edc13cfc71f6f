//! API data transfer objects

pub mod auth;
pub mod common;
pub mod user;

pub use auth::*;
pub use common::*;
pub use user::*;
