//! HTTP error responses

use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{CoreError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No caller identity was forwarded
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unreadable or oversized multipart body
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// JSON body missing, unreadable or of the wrong shape
    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    /// Failure reported by a record manager
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => ApiError::Core(
                CoreError::not_found(format!("No record at this path: {}", err.body_text())),
            ),
            other => ApiError::Core(CoreError::internal(other.body_text())),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DuplicateIdentity | ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::UpstreamUnavailable | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "Caller identity required".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ValidationFailed", msg),
            ApiError::Multipart(err) => (err.status(), "ValidationFailed", err.body_text()),
            ApiError::Json(err) => {
                // Keep the body limit status; everything else is a bad request
                let status = match &err {
                    JsonRejection::BytesRejection(_) => err.status(),
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, "ValidationFailed", err.body_text())
            }
            ApiError::Core(CoreError::Internal(detail)) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    "Internal server error".to_string(),
                )
            }
            ApiError::Core(err) => {
                let kind = err.kind();
                (status_for(kind), kind.as_str(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
