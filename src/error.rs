// Error types for the upstream API boundary and for the gateway's HTTP responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Failures talking to the marketplace API.
///
/// None of these are retried; callers surface them and leave prior state intact.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("marketplace API returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classifies a non-success upstream status.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("request failed with status {}", status));
        match status {
            401 | 403 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(message),
            400 | 422 => ApiError::Validation(message),
            _ => ApiError::Remote { status, message },
        }
    }
}

// Application error returned by the gateway handlers
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized(message) => AppError::Unauthorized(message),
            ApiError::NotFound(message) => AppError::NotFound(message),
            ApiError::Validation(message) => AppError::BadRequest(message),
            other @ (ApiError::Transport(_) | ApiError::Remote { .. } | ApiError::Decode(_)) => {
                AppError::BadGateway(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized access attempt: {}", message);
                (StatusCode::UNAUTHORIZED, message)
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadGateway(message) => {
                tracing::error!("Marketplace API failure: {}", message);
                (StatusCode::BAD_GATEWAY, message)
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
