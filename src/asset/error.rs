//! Asset server error types
//!
//! Every handler error becomes a JSON body `{"error": {"code", "message"}}`.
//! Server-side failures are logged and replaced with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::error::VaultError;

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `NOT_FOUND`
    pub code: String,
    pub message: String,
}

/// Asset server error type
#[derive(Error, Debug)]
pub enum AssetError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Unreadable request body: {reason}")]
    BadBody { reason: String },

    #[error("Server bind failed: {reason}")]
    BindFailed { reason: String },

    #[error("Internal server error: {reason}")]
    Internal { reason: String },
}

impl AssetError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AssetError::Vault(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AssetError::Vault(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AssetError::Vault(VaultError::Integrity(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTEGRITY_ERROR")
            }
            AssetError::Vault(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AssetError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            AssetError::BadBody { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AssetError::BindFailed { .. } | AssetError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// Check if this error should result in a 404 Not Found response
    pub fn is_not_found(&self) -> bool {
        self.status_and_code().0 == StatusCode::NOT_FOUND
    }
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}
