/// Error types for blog-api
///
/// This module defines all error types that can occur in the service.
/// Errors are converted to appropriate HTTP responses for API clients.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;

/// Result type for blog-api operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Malformed field, bad query parameter, undecodable image
    Validation(String),

    /// Uniqueness violation (duplicate title/slug/name/email)
    Conflict(String),

    /// Identity does not resolve
    NotFound,

    /// Post references an image that is not in the database
    InvalidImageReference(String),

    /// Declared content type is not in the accepted set
    UnsupportedMediaType(String),

    /// Missing or wrong ApiKey header
    Unauthorized,

    /// Document store operation failed
    Database(String),

    /// Image host (Cloudinary) operation failed
    ImageHost(String),

    /// Unexpected failure (codec unavailable, task panic, ...)
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::NotFound => write!(f, "Not found"),
            AppError::InvalidImageReference(msg) => write!(f, "Invalid image reference: {}", msg),
            AppError::UnsupportedMediaType(msg) => write!(f, "Unsupported media type: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::ImageHost(msg) => write!(f, "Image host error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Uniqueness conflicts surface as 400, same as validation failures
            AppError::Validation(_)
            | AppError::Conflict(_)
            | AppError::InvalidImageReference(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::ImageHost(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // 404 carries no detail beyond the status line
        if matches!(self, AppError::NotFound) {
            return HttpResponse::NotFound().finish();
        }

        // Server-side failures are logged with full context and returned
        // without internal detail
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            return HttpResponse::InternalServerError().json(ErrorBody {
                error: "server_error",
                message: "Internal Server Error".to_string(),
                status: status.as_u16(),
            });
        }

        let error = match self {
            AppError::Conflict(_) => "conflict_error",
            AppError::InvalidImageReference(_) => "reference_error",
            AppError::UnsupportedMediaType(_) => "unsupported_media_type",
            AppError::Unauthorized => "authentication_error",
            _ => "validation_error",
        };

        HttpResponse::build(status).json(ErrorBody {
            error,
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ImageHost(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
