//! API error types and response shaping
//!
//! Every auth endpoint surfaces failures through [`ApiError`] so the error
//! body shape stays uniform: `{error, message}` for 401/403/500 and
//! `{errors: {field: [messages]}}` for validation failures.

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input, keyed by field.
    #[error("validation failed")]
    Validation(HashMap<String, Vec<String>>),

    /// Generic authentication failure. Deliberately does not distinguish
    /// unknown email from wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Refresh exchange rejected: bad access-token signature, mismatched or
    /// expired refresh token. One message for all of them.
    #[error("invalid refresh request")]
    InvalidRefresh,

    /// 400 with an error code and message (e.g. bad or expired OTP).
    #[error("{1}")]
    BadRequest(&'static str, &'static str),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                let body = Json(json!({ "errors": errors }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::InvalidCredentials => error_body(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password",
            ),
            ApiError::InvalidRefresh => error_body(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired refresh token",
            ),
            ApiError::BadRequest(error, message) => {
                error_body(StatusCode::BAD_REQUEST, error, message)
            }
            ApiError::NotFound => {
                error_body(StatusCode::NOT_FOUND, "not_found", "Resource not found")
            }
            ApiError::Database(e) => {
                tracing::error!(error = ?e, "Database query failed");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
            ApiError::Internal => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        }
    }
}

fn error_body(status: StatusCode, error: &str, message: &str) -> Response {
    let body = Json(json!({
        "error": error,
        "message": message,
    }));
    (status, body).into_response()
}
