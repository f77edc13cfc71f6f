//! Business logic layer

pub mod token;
pub mod user;

pub use token::TokenService;
pub use user::UserService;
