use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ServiceError;

/// Error type for HTTP handlers, rendered as `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The synchronous generate endpoint finished with a failed task.
    #[error("Failed to generate architecture: {0}")]
    GenerationFailed(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Service(err) => match err {
                ServiceError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                ServiceError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                ServiceError::Scheduling(_)
                | ServiceError::Config(_)
                | ServiceError::Io(_)
                | ServiceError::Internal(_) => {
                    tracing::error!(error = %err, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::GenerationFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "GENERATION_FAILED",
                self.to_string(),
            ),
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
