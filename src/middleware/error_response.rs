//! Error response normalization middleware
//!
//! Framework-level rejections (malformed JSON, wrong content type, unknown
//! method) come back as text/plain. This middleware rewrites every non-JSON
//! 4xx/5xx into the API's `{"error", "status"}` body without leaking parser
//! details.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::ErrorResponse;

pub async fn normalize_error_response(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    if is_json {
        return response;
    }

    generic_error_response(status)
}

fn generic_error_response(status: StatusCode) -> Response {
    // Body deserialization failures are reported as plain bad requests
    let status = if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    };

    let message = match status {
        StatusCode::BAD_REQUEST => "Invalid request body",
        StatusCode::UNAUTHORIZED => "Authentication required",
        StatusCode::FORBIDDEN => "Access denied",
        StatusCode::NOT_FOUND => "Not found",
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "Unsupported content type",
        StatusCode::REQUEST_TIMEOUT => "Request timed out",
        _ if status.is_client_error() => "Client error",
        _ => crate::error::INTERNAL_ERROR_MESSAGE,
    };

    let body = ErrorResponse {
        error: message.to_string(),
        status: status.as_u16(),
    };

    (status, Json(body)).into_response()
}
