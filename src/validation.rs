use crate::error::AppError;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

pub type ApiError = Custom<Json<ValidationResponse>>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> ApiError;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database error".to_string()),
            AppError::Authentication(msg) => {
                ("authentication", format!("Authentication error: {}", msg))
            }
            AppError::Authorization(msg) => {
                ("authorization", format!("Permission denied: {}", msg))
            }
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::Conflict(msg) => ("conflict", msg.clone()),
            AppError::InvalidTransition(err) => ("status", err.to_string()),
            AppError::ExternalService(msg) => ("service", format!("Service error: {}", msg)),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        let (field, message) = match self {
            s if s == Status::Forbidden => (
                "permission",
                "You don't have permission to perform this action",
            ),
            s if s == Status::Unauthorized => ("authentication", "Authentication required"),
            s if s == Status::NotFound => ("resource", "Resource not found"),
            s if s == Status::Conflict => ("resource", "Resource already exists"),
            s if s == Status::BadRequest => ("request", "Bad request"),
            s if s == Status::UnprocessableEntity => ("validation", "Validation failed"),
            s if s == Status::InternalServerError => ("server", "Internal server error"),
            s if s == Status::ServiceUnavailable => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub validator::ValidationErrors);

impl From<ValidationErrorWrapper> for ApiError {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let errors = wrapper.0;
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::new(error_map)),
        )
    }
}

/// Runs `validator` rules on a JSON body and unwraps it.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, ApiError> {
        let inner = self.into_inner();
        inner
            .validate()
            .map_err(|errors| ApiError::from(ValidationErrorWrapper(errors)))?;
        Ok(inner)
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> Result<T, ApiError> {
        self.map_err(|err| err.to_validation_response())
    }
}

pub trait PermissionCheckExt {
    fn validate_custom(self) -> Result<(), ApiError>;
}

impl PermissionCheckExt for Result<(), Status> {
    fn validate_custom(self) -> Result<(), ApiError> {
        self.map_err(|status| status.to_validation_response())
    }
}
