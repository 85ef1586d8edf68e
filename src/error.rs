use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::coaching::InvalidTransition;

/// Message raised by the overlap triggers on `coaching_appointments`.
pub const SLOT_CONFLICT_MARKER: &str = "appointment_slot_conflict";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Like the `From<sqlx::Error>` conversion, but recognises the appointment
    /// overlap trigger and reports it as a conflict.
    pub fn from_db_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.message().contains(SLOT_CONFLICT_MARKER) {
                return AppError::Conflict(
                    "The coach already has an appointment in this time range".to_string(),
                );
            }
        }
        AppError::Database(err)
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::Authentication(msg) => {
                warn!(message = %msg, context = %ctx, "Authentication error");
                "authentication_error"
            }
            AppError::Authorization(msg) => {
                warn!(message = %msg, context = %ctx, "Authorization error");
                "authorization_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::Conflict(msg) => {
                warn!(message = %msg, context = %ctx, "Conflict error");
                "conflict_error"
            }
            AppError::InvalidTransition(err) => {
                warn!(from = %err.from, attempted = err.attempted, context = %ctx, "Invalid appointment transition");
                "invalid_transition_error"
            }
            AppError::ExternalService(msg) => {
                error!(message = %msg, context = %ctx, "External service error");
                "external_service_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_) | AppError::Internal(_) | AppError::ExternalService(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::Conflict(_) => Status::Conflict,
            AppError::InvalidTransition(_) => Status::UnprocessableEntity,
            AppError::ExternalService(_) => Status::ServiceUnavailable,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::AppointmentStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict("taken".to_string()).status_code(),
            Status::Conflict
        );
        assert_eq!(
            AppError::NotFound("missing".to_string()).status_code(),
            Status::NotFound
        );

        let transition = AppError::from(InvalidTransition {
            from: AppointmentStatus::Rejected,
            attempted: "approve",
        });
        assert_eq!(transition.status_code(), Status::UnprocessableEntity);
        assert_eq!(
            transition.to_string(),
            "Invalid transition: cannot approve an appointment that is rejected"
        );
    }

    #[test]
    fn test_conversion_into_bare_status() {
        let status: Status = AppError::Authorization("not yours".to_string()).into();
        assert_eq!(status, Status::Forbidden);

        let status: Status = AppError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(status, Status::InternalServerError);
    }

    #[test]
    fn test_non_trigger_errors_stay_database_errors() {
        let err = AppError::from_db_write(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
