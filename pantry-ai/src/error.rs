//! Error types for pantry-ai HTTP handlers
//!
//! Every error body has the shape `{ "error": <summary>, "details": <cause> }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::{ClassificationError, PipelineError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Method not allowed (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Vision backend failure (500)
    #[error("Error classifying image: {0}")]
    Classification(#[from] ClassificationError),

    /// Blob store failure (503)
    #[error("Image storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Repository or configuration error
    #[error("Common error: {0}")]
    Common(#[from] pantry_common::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PipelineError::StorageUnavailable(msg) => ApiError::StorageUnavailable(msg),
            PipelineError::Classification(e) => ApiError::Classification(e),
            PipelineError::Cancelled => ApiError::Internal("Pipeline cancelled".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Invalid request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed",
                String::new(),
            ),
            ApiError::Classification(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error classifying image",
                err.to_string(),
            ),
            ApiError::StorageUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Image storage unavailable",
                msg,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error", msg),
            ApiError::Common(err) => match err {
                pantry_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "Invalid request", msg)
                }
                pantry_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Repository error",
                    other.to_string(),
                ),
            },
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error, details = %details, "Request failed");
        }

        let body = Json(json!({
            "error": error,
            "details": details,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
