//! Centralized error handling module
//!
//! Provides unified error types and HTTP response mapping for the HTTP layer.
//! The Time-in-Range calculator itself is total and has no error type.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Standardized error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Unique correlation ID for tracing
    pub correlation_id: String,
    /// Error type classification
    pub error_type: String,
    /// Human-readable error message (safe for clients)
    pub message: String,
    /// HTTP status code
    pub status_code: u16,
    /// Timestamp of the error
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str, status_code: StatusCode) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            status_code: status_code.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::BadRequest(msg) => msg,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_response = ErrorResponse::new(self.error_type(), self.message(), status);

        error!(
            correlation_id = %error_response.correlation_id,
            error_type = %error_response.error_type,
            status_code = %status.as_u16(),
            "Error response generated"
        );

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status() {
        let error = AppError::ValidationError("Invalid glucose value".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_error_status() {
        let error = AppError::Unauthorized("Missing X-User-ID header".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.error_type(), "UNAUTHORIZED");
    }

    #[test]
    fn test_not_found_error_status() {
        let error = AppError::NotFound("No glucose readings available".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.message(), "No glucose readings available");
    }

    #[test]
    fn test_error_response_format() {
        let response = ErrorResponse::new("TEST_ERROR", "Test message", StatusCode::BAD_REQUEST);
        assert!(!response.correlation_id.is_empty());
        assert_eq!(response.error_type, "TEST_ERROR");
        assert_eq!(response.message, "Test message");
        assert_eq!(response.status_code, 400);
    }
}
