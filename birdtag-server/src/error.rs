//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use birdtag_core::BirdtagError;
use thiserror::Error;

use crate::objects::{ObjectError, PresignError};
use crate::store::StoreError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden - credential invalid or expired
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - a backing service failed
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Domain error from birdtag-core
    #[error("Birdtag error: {0}")]
    Birdtag(#[from] BirdtagError),

    /// Storage failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Birdtag(ref e) => match e {
                BirdtagError::Validation(_) => StatusCode::BAD_REQUEST,
                BirdtagError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                BirdtagError::NotFound(_) => StatusCode::NOT_FOUND,
                BirdtagError::DetectionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                BirdtagError::Storage(_) | BirdtagError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Store(ref e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Migration(_) | StoreError::Query(_) | StoreError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Birdtag(ref e) => match e {
                BirdtagError::Validation(_) => "VALIDATION_ERROR",
                BirdtagError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
                BirdtagError::NotFound(_) => "NOT_FOUND",
                BirdtagError::DetectionFailure(_) => "DETECTION_FAILED",
                BirdtagError::Storage(_) => "STORAGE_ERROR",
                BirdtagError::Serialization(_) => "SERIALIZATION_ERROR",
            },
            Self::Store(ref e) => match e {
                StoreError::NotFound(_) => "NOT_FOUND",
                _ => "STORAGE_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    pub fn client_message(&self) -> String {
        match self {
            // Client-facing domain errors carry their own message
            Self::Birdtag(BirdtagError::Validation(msg))
            | Self::Birdtag(BirdtagError::UnsupportedMediaType(msg))
            | Self::Birdtag(BirdtagError::NotFound(msg)) => msg.clone(),
            Self::Birdtag(BirdtagError::DetectionFailure(_)) => {
                "Detection service unavailable".to_string()
            }
            Self::Birdtag(_) | Self::Store(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Birdtag(_) => "birdtag",
            Self::Store(_) => "storage",
        }
    }
}

impl From<ObjectError> for ApiError {
    fn from(e: ObjectError) -> Self {
        match e {
            ObjectError::NotFound(key) => Self::NotFound(format!("object {key}")),
            ObjectError::InvalidKey(key) => Self::BadRequest(format!("invalid object key: {key}")),
            ObjectError::Io(msg) => Self::Internal(format!("object store: {msg}")),
        }
    }
}

impl From<PresignError> for ApiError {
    fn from(e: PresignError) -> Self {
        match e {
            PresignError::InvalidBaseUrl(msg) => Self::Internal(msg),
            PresignError::Expired | PresignError::BadSignature => Self::Forbidden(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
