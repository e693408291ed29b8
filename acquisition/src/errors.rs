use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storage::StorageError;
use thiserror::Error;

/// Result type alias for acquisition operations
pub type Result<T, E = AcquisitionError> = std::result::Result<T, E>;

/// Errors that can occur while serving acquisition requests
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Missing or invalid request fields. Never retried by clients.
    #[error("{0}")]
    MalformedRequest(String),

    #[error("{0} timed out")]
    DependencyTimeout(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AcquisitionError {
    fn into_response(self) -> Response {
        match self {
            AcquisitionError::MalformedRequest(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            AcquisitionError::Storage(StorageError::NotFound) => {
                (StatusCode::NOT_FOUND, "deployment not found").into_response()
            }
            other => {
                // Anything else is a server-side failure; the detail goes to
                // the log/error sink, not the client.
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
