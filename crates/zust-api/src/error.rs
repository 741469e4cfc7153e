//! API error type
//!
//! Every handler failure becomes an [`ApiError`]: a status code and a
//! message that is safe to show to clients. Rendered as `{"message": ...}`.

use thiserror::Error;
use tracing::{debug, error};
use zust_accounts::StoreError;
use zust_auth::AuthError;

use crate::assets::MediaError;

/// Handler error with its HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Client-facing message
    pub message: String,
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Create an error with an explicit status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// 409 Conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    /// 500 with the generic message.
    pub fn internal() -> Self {
        Self::new(500, "Internal server error")
    }

    /// 400 for a body or query that failed validation.
    pub fn invalid_body() -> Self {
        Self::bad_request("Invalid request body")
    }

    /// Map a persistence error, logging it with the operation that failed.
    pub fn store(operation: &str, err: StoreError) -> Self {
        error!(operation, error = %err, "Store operation failed");
        Self::internal()
    }

    /// Map a media storage error, logging it with the key involved.
    pub fn media(key: &str, err: MediaError) -> Self {
        error!(key, error = %err, "Media operation failed");
        Self::internal()
    }

    /// Check if this is a server-side failure.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_server_error() {
            error!(code = err.error_code(), error = %err, "Request failed");
        } else {
            debug!(code = err.error_code(), error = %err, "Request rejected");
        }
        Self::new(err.status_code(), err.public_message())
    }
}
