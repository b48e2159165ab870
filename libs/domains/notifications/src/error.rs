//! Error types for the notifications domain.

use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, ErrorCode};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Request failed field-level validation.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationErrors),

    /// Recipient is on the suppression list; no job was written.
    #[error("Recipient is suppressed: {0}")]
    RecipientSuppressed(String),

    #[error("Email job not found: {0}")]
    JobNotFound(Uuid),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// Email provider could not be set up.
    #[error("Email provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::Config(err.to_string())
    }
}

/// Convert NotificationError to AppError for standardized error responses
impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Validation(errors) => AppError::ValidationError(errors),
            NotificationError::RecipientSuppressed(email) => AppError::Rejected {
                code: ErrorCode::RecipientSuppressed,
                message: format!("Recipient {} is suppressed", email),
            },
            NotificationError::JobNotFound(id) => {
                AppError::NotFound(format!("Email job {} not found", id))
            }
            NotificationError::Database(e) => AppError::Database(e),
            NotificationError::Serialization(e) => AppError::SerdeJson(e),
            NotificationError::Template(msg)
            | NotificationError::Provider(msg)
            | NotificationError::Config(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
