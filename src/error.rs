//! Crate-wide error taxonomy.
//!
//! Service functions return `Result<T, ApiError>` directly so the HTTP layer
//! never has to guess a status code from a generic error message. Background
//! components (reconciler, pub/sub listener, delivery queue) never let an
//! `ApiError` escape their loops -- see each module's tick/run function.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Agent id, channel id, or other referenced entity does not exist. 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate membership, duplicate agent name, duplicate assignment. 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing required field, out-of-range heartbeat period, invalid sort
    /// field, malformed pagination cursor, missing sender identifier. 400.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Model provider has no configured credentials at agent create/update. 422.
    #[error("provider not configured: {0}")]
    ProviderUnconfigured(String),

    /// Database or bus unreachable. Surfaced only by the health check. 503.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Unhandled condition. Logged at error, never shown to the caller. 500.
    #[error("internal error: {0}")]
    Internal(String),

    /// Delivery-queue retries exhausted. Never surfaced over HTTP -- this
    /// variant exists so internal code can construct it uniformly before
    /// logging and discarding it.
    #[error("worker unreachable: {0}")]
    WorkerUnreachable(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ProviderUnconfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::WorkerUnreachable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation",
            ApiError::ProviderUnconfigured(_) => "provider_unconfigured",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal",
            ApiError::WorkerUnreachable(_) => "worker_unreachable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error surfaced to http layer");
        }
        let body = json!({
            "errors": [{
                "status": status.as_u16(),
                "title": self.title(),
                "detail": self.to_string(),
            }]
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("row not found".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
