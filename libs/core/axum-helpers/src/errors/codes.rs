//! Error codes carried in every error response body.
//!
//! Each code has a SCREAMING_SNAKE_CASE identifier for clients, an integer
//! for logs and dashboards, a default message and the HTTP status it maps to.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::RecipientSuppressed;
//! assert_eq!(code.as_str(), "RECIPIENT_SUPPRESSED");
//! assert_eq!(code.code(), 1101);
//! ```

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1099)
    /// Request validation failed
    ValidationError,

    /// Invalid UUID in path
    InvalidUuid,

    /// JSON extraction from request body failed
    JsonExtraction,

    NotFound,

    InternalError,

    /// Missing or wrong credentials
    Unauthorized,

    Conflict,

    ServiceUnavailable,

    BadRequest,

    // Email pipeline admission errors (1100-1199)
    /// Recipient is on the suppression list
    RecipientSuppressed,

    // Database errors (2000-2999)
    DatabaseError,

    /// Database connection pool timed out
    DatabasePoolTimeout,

    /// Database record not found
    DatabaseNotFound,

    // JSON errors (5000s)
    SerdeJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidUuid => "INVALID_UUID",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::NotFound => "NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict => "CONFLICT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::RecipientSuppressed => "RECIPIENT_SUPPRESSED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DatabasePoolTimeout => "DATABASE_POOL_TIMEOUT",
            Self::DatabaseNotFound => "DATABASE_NOT_FOUND",
            Self::SerdeJsonError => "SERDE_JSON_ERROR",
        }
    }

    /// Integer code for logging and monitoring.
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidUuid => 1002,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::Unauthorized => 1006,
            Self::Conflict => 1008,
            Self::ServiceUnavailable => 1011,
            Self::BadRequest => 1012,

            Self::RecipientSuppressed => 1101,

            Self::DatabaseError => 2003,
            Self::DatabasePoolTimeout => 2013,
            Self::DatabaseNotFound => 2001,

            Self::SerdeJsonError => 5001,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidUuid => "Invalid UUID format",
            Self::JsonExtraction => "Failed to parse request body",
            Self::NotFound => "Resource not found",
            Self::InternalError => "An internal server error occurred",
            Self::Unauthorized => "Authentication required",
            Self::Conflict => "Resource already exists",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
            Self::BadRequest => "Bad request",
            Self::RecipientSuppressed => "Recipient is suppressed",
            Self::DatabaseError => "Database error occurred",
            Self::DatabasePoolTimeout => "Database connection pool timed out",
            Self::DatabaseNotFound => "Database record not found",
            Self::SerdeJsonError => "JSON serialization error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError | Self::InvalidUuid | Self::JsonExtraction | Self::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound | Self::DatabaseNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict | Self::RecipientSuppressed => StatusCode::CONFLICT,
            Self::ServiceUnavailable | Self::DatabasePoolTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError | Self::DatabaseError | Self::SerdeJsonError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
