//! Authentication endpoints

use crate::domain::{
    ErrorResponse, TokenRefreshRequest, TokenResponse, UserInfoResponse, UserLoginRequest,
    UserRegistrationRequest,
};
use crate::error::Result;
use crate::middleware::auth::{AuthUser, ROLE_INDIVIDUALS_ADMIN, ROLE_INDIVIDUALS_USER};
use crate::state::HasServices;
use axum::{extract::State, http::StatusCode, Json};

#[utoipa::path(
    post,
    path = "/v1/auth/registration",
    tag = "Authentication",
    request_body = UserRegistrationRequest,
    responses(
        (status = 201, description = "User registered and logged in", body = TokenResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 503, description = "Keycloak unavailable", body = ErrorResponse)
    )
)]
/// Register a new user
pub async fn register<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<UserRegistrationRequest>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    let token = state.user_service().register(input).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Authentication",
    request_body = UserLoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<UserLoginRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(state.user_service().login(input).await?))
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh-token",
    tag = "Authentication",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 400, description = "Invalid or expired refresh token", body = ErrorResponse),
        (status = 401, description = "Refresh token rejected", body = ErrorResponse)
    )
)]
pub async fn refresh_token<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<TokenRefreshRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(state.user_service().refresh_token(input).await?))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Authentication",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "Profile of the caller", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller lacks an individuals role", body = ErrorResponse)
    )
)]
/// Profile of the authenticated user
pub async fn me<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<Json<UserInfoResponse>> {
    auth.require_any_authority(&[ROLE_INDIVIDUALS_ADMIN, ROLE_INDIVIDUALS_USER])?;
    let info = state.user_service().get_user_info(&auth.user_id).await?;
    Ok(Json(info))
}
