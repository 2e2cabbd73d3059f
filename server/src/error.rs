//! HTTP error mapping - distilled spec section 7 "Error handling design".
//!
//! All user-visible HTTP errors are `{error: string}` JSON bodies with a
//! conventional status code; credential failures are deliberately uniform
//! (see [`ApiError::Unauthorized`]) to avoid enumerating valid phone numbers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failure modes surfaced by a route handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or semantically invalid request body - HTTP 400.
    #[error("{0}")]
    Validation(String),
    /// Missing or invalid bearer token, or bad credentials - HTTP 401.
    #[error("invalid credentials")]
    Unauthorized,
    /// Referenced resource does not exist, or is not owned by the caller -
    /// HTTP 404.
    #[error("not found")]
    NotFound,
    /// A unique constraint was violated (e.g. phone already registered) -
    /// HTTP 409.
    #[error("{0}")]
    Conflict(String),
    /// Every other failure - repository errors, broker errors, a poisoned
    /// lock - HTTP 500. The detail is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ApiError {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        ApiError::Internal(error.to_string())
    }
}
