//! Error types for the HTTP surface.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::{DatabaseError, ValidationError};
use messaging::GatewayError;
use thiserror::Error;

use crate::blob::BlobError;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Store, directory or profile failure.
    #[error("{0}")]
    Database(#[from] DatabaseError),

    /// Failure on the shared send path.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Request input rejected before reaching storage.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Upload could not be stored.
    #[error("{0}")]
    Blob(#[from] BlobError),

    /// Malformed request that is not a field validation failure.
    #[error("{0}")]
    BadRequest(String),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Database(err) => database_status(err),
            ServerError::Gateway(err) => match err {
                GatewayError::Malformed(_) | GatewayError::Invalid(_) => StatusCode::BAD_REQUEST,
                GatewayError::MessageNotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
                GatewayError::UnknownSession(_) => StatusCode::INTERNAL_SERVER_ERROR,
                GatewayError::Database(err) => database_status(err),
            },
            ServerError::Validation(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Blob(BlobError::Empty) => StatusCode::BAD_REQUEST,
            ServerError::Blob(BlobError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn database_status(err: &DatabaseError) -> StatusCode {
    match err {
        DatabaseError::Validation(_) => StatusCode::BAD_REQUEST,
        DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
        DatabaseError::AlreadyExists { .. } => StatusCode::CONFLICT,
        DatabaseError::Sqlx(_) | DatabaseError::Migration(_) | DatabaseError::Corrupt { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the log.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Server error".to_string()
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
            self.to_string()
        };

        let body = serde_json::json!({
            "ok": false,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for request handlers.
pub type Result<T> = std::result::Result<T, ServerError>;
