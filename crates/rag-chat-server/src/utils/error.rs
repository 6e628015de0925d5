use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message shown to end users when a turn fails hard.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again.";

/// Failure classes of a single model invocation.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("model request timed out")]
    Timeout,

    #[error("provider error ({status:?}): {message}")]
    Provider { status: Option<u16>, message: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model returned no content")]
    EmptyResponse,
}

impl ModelError {
    /// Errors that allow a single retry against the fallback model.
    pub fn is_rate_limit_class(&self) -> bool {
        matches!(self, ModelError::RateLimited { .. } | ModelError::Timeout)
    }
}

/// Hard failure of a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("answer generation failed: {0}")]
    Model(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("LLM error: {0}")]
    LlmError(String),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::LlmError(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    GENERIC_FAILURE_MESSAGE.to_string(),
                )
            }
            ApiError::LlmError(msg) => {
                tracing::error!("LLM error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "LlmError",
                    GENERIC_FAILURE_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
