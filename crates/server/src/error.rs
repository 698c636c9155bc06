//! HTTP error mapping.
//!
//! Every failure leaves the server as `{"success": false, "error": "..."}`
//! with a status derived from the error kind. Storage and internal failures
//! are logged and reported to the client with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use snaphunt_core::TrackerError;
use snaphunt_storage::StorageError;
use tracing::error;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Tracker rejected the operation
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Malformed or incomplete request
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Unknown resource
    #[error("{0}")]
    NotFound(String),

    /// Duplicate resource
    #[error("{0}")]
    Conflict(String),

    /// Evidence taken too far from the target
    #[error("evidence is {distance:.0} m from the target, at most {limit:.0} m allowed")]
    OutsideGeofence {
        /// Measured distance in meters
        distance: f64,
        /// Allowed radius in meters
        limit: f64,
    },

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Tracker(e) => match e {
                TrackerError::AlreadyActive(_) | TrackerError::InvalidState(_) => {
                    StatusCode::CONFLICT
                }
                TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
                TrackerError::Forbidden(_) => StatusCode::FORBIDDEN,
            },
            ApiError::Storage(e) => match e {
                StorageError::NotFound(_) | StorageError::InvalidPath(_) => StatusCode::NOT_FOUND,
                StorageError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::OutsideGeofence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));
        (status, body).into_response()
    }
}
