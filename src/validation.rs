use rocket::serde::json::Json;
use rocket::Request;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, ErrorResponse};

pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("must not be empty".into());
        return Err(error);
    }
    Ok(())
}

/// Flattens field errors into one stable message, e.g.
/// `coach_id: must not be empty; duration: required`.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, field_errors)| {
            let messages = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {}", field, messages)
        })
        .collect();

    fields.sort();
    fields.join("; ")
}

pub trait ValidateExt: Validate + Sized {
    fn validated(self) -> Result<Self, AppError> {
        self.validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;
        Ok(self)
    }
}

impl<T: Validate> ValidateExt for T {}

pub trait JsonValidateExt<T> {
    fn validate_body(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    #[instrument(skip_all)]
    fn validate_body(self) -> Result<T, AppError> {
        self.into_inner().validated()
    }
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Malformed request body"))
}

#[catch(404)]
pub fn not_found(req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(format!("No route for {}", req.uri())))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        "Request body has fields of the wrong type",
    ))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Internal server error"))
}
