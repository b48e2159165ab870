pub mod codes;
pub mod handlers;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Body of every error response.
///
/// ```json
/// {
///   "code": 1101,
///   "error": "RECIPIENT_SUPPRESSED",
///   "message": "Recipient is suppressed",
///   "details": null
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error details (e.g. validation field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON parsing error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A domain rule refused the request; status follows the code.
    #[error("{code}: {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::SerdeJson(e) => {
                tracing::error!(error_code = ErrorCode::SerdeJsonError.code(), error = ?e, "JSON error");
                default_body(ErrorCode::SerdeJsonError)
            }
            AppError::Database(e) => map_db_error(&e),
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!(error_code = ErrorCode::JsonExtraction.code(), error = ?e, "JSON extraction error");
                (
                    e.status(),
                    ErrorResponse::new(ErrorCode::JsonExtraction, e.body_text()),
                )
            }
            AppError::ValidationError(e) => {
                tracing::info!(error_code = ErrorCode::ValidationError.code(), error = ?e, "Validation error");
                let details = serde_json::to_value(&e).unwrap_or(serde_json::Value::Null);
                let (status, body) = default_body(ErrorCode::ValidationError);
                (status, body.with_details(details))
            }
            AppError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", msg);
                with_message(ErrorCode::BadRequest, msg)
            }
            AppError::Unauthorized(msg) => {
                tracing::info!("Unauthorized: {}", msg);
                with_message(ErrorCode::Unauthorized, msg)
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_code = ErrorCode::NotFound.code(), "Not found: {}", msg);
                with_message(ErrorCode::NotFound, msg)
            }
            AppError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                with_message(ErrorCode::Conflict, msg)
            }
            AppError::Rejected { code, message } => {
                tracing::info!(error_code = code.code(), error = %code, "Request rejected: {}", message);
                with_message(code, message)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!(error_code = ErrorCode::InternalError.code(), "Internal server error: {}", msg);
                with_message(ErrorCode::InternalError, msg)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                with_message(ErrorCode::ServiceUnavailable, msg)
            }
        };

        (status, Json(body)).into_response()
    }
}

fn default_body(code: ErrorCode) -> (StatusCode, ErrorResponse) {
    (code.status(), ErrorResponse::new(code, code.default_message()))
}

fn with_message(code: ErrorCode, message: String) -> (StatusCode, ErrorResponse) {
    (code.status(), ErrorResponse::new(code, message))
}

/// Database details stay in the logs; clients only see the code.
fn map_db_error(error: &DbErr) -> (StatusCode, ErrorResponse) {
    let code = match error {
        DbErr::RecordNotFound(_) => ErrorCode::DatabaseNotFound,
        DbErr::ConnectionAcquire(_) => ErrorCode::DatabasePoolTimeout,
        _ => ErrorCode::DatabaseError,
    };

    if code.status().is_server_error() {
        tracing::error!(error_code = code.code(), error = ?error, "Database error");
    } else {
        tracing::info!(error_code = code.code(), error = ?error, "Database lookup failed");
    }

    default_body(code)
}
