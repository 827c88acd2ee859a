use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::Responder;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn, Span};

use crate::env::AppConfig;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Malformed model output: {0}")]
    Extraction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::ExternalService(msg) => {
                error!(message = %msg, context = %ctx, "External service error");
                "external_service_error"
            }
            AppError::Extraction(msg) => {
                error!(message = %msg, context = %ctx, "Model output could not be parsed");
                "extraction_error"
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
                AppError::Database(_)
                | AppError::Internal(_)
                | AppError::ExternalService(_)
                | AppError::Extraction(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::Database(_)
            | AppError::ExternalService(_)
            | AppError::Extraction(_)
            | AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }

    /// Debug rendering plus the `source()` chain, exposed as `stack` in development.
    pub fn stack(&self) -> String {
        let mut stack = format!("{:?}", self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            stack.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        stack
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            stack: None,
        }
    }

    pub fn from_app_error(err: &AppError, include_stack: bool) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            stack: include_stack.then(|| err.stack()),
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()));

        let include_stack = req
            .rocket()
            .state::<AppConfig>()
            .is_some_and(AppConfig::is_development);

        Custom(
            status,
            Json(ErrorResponse::from_app_error(&self, include_stack)),
        )
        .respond_to(req)
    }
}

/// For side effects that must never fail the request: log and carry on.
pub trait BestEffort<T> {
    fn best_effort(self, what: &str) -> Option<T>;
}

impl<T> BestEffort<T> for Result<T, AppError> {
    fn best_effort(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, side_effect = %what, "Non-critical side effect failed");
                None
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(format!("Completion request failed: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::Validation("coach_id is required".to_string());
        assert_eq!(err.status_code(), Status::BadRequest);
    }

    #[test]
    fn downstream_failures_map_to_internal_error() {
        assert_eq!(
            AppError::Extraction("no JSON object".to_string()).status_code(),
            Status::InternalServerError
        );
        assert_eq!(
            AppError::ExternalService("timeout".to_string()).status_code(),
            Status::InternalServerError
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            Status::InternalServerError
        );
    }

    #[test]
    fn best_effort_swallows_errors() {
        let failed: Result<i64, AppError> = Err(AppError::Internal("disk full".to_string()));
        assert_eq!(failed.best_effort("audit insert"), None);

        let ok: Result<i64, AppError> = Ok(7);
        assert_eq!(ok.best_effort("audit insert"), Some(7));
    }

    #[test]
    fn stack_is_only_included_on_request() {
        let err = AppError::NotFound("Session s1".to_string());

        let body = ErrorResponse::from_app_error(&err, false);
        assert!(body.stack.is_none());
        assert_eq!(body.error, "Not found: Session s1");

        let body = ErrorResponse::from_app_error(&err, true);
        assert!(body.stack.unwrap().contains("NotFound"));
    }
}
