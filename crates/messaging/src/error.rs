//! Error types for gateway operations.

use database::{DatabaseError, ValidationError};
use thiserror::Error;

use crate::registry::SessionId;

/// Errors that can occur while handling a realtime event or a send.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Frame could not be decoded into a known event.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A required field was missing or invalid.
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    /// Message referenced by a status event does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Membership enforcement rejected the event.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Session is not (or no longer) registered.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Store or directory failure.
    #[error("{0}")]
    Database(#[from] DatabaseError),
}

impl GatewayError {
    /// Whether the error was caused by the client's input.
    pub fn is_client_error(&self) -> bool {
        match self {
            GatewayError::Malformed(_)
            | GatewayError::Invalid(_)
            | GatewayError::MessageNotFound(_)
            | GatewayError::Forbidden(_)
            | GatewayError::UnknownSession(_) => true,
            GatewayError::Database(err) => err.is_validation() || err.is_not_found(),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
