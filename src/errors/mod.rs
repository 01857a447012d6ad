use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    DatabaseError(String),
    StorageError(String),
    InternalServerError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation Error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Gone(msg) => write!(f, "Gone: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage Error: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(msg) => HttpResponse::BadRequest().json(ErrorResponse { error: msg.clone() }),
            AppError::Unauthorized(msg) => HttpResponse::Unauthorized().json(ErrorResponse { error: msg.clone() }),
            AppError::Forbidden(msg) => HttpResponse::Forbidden().json(ErrorResponse { error: msg.clone() }),
            AppError::NotFound(msg) => HttpResponse::NotFound().json(ErrorResponse { error: msg.clone() }),
            AppError::Conflict(msg) => HttpResponse::Conflict().json(ErrorResponse { error: msg.clone() }),
            AppError::Gone(msg) => HttpResponse::Gone().json(ErrorResponse { error: msg.clone() }),
            AppError::DatabaseError(msg) => HttpResponse::InternalServerError().json(ErrorResponse { error: msg.clone() }),
            AppError::StorageError(msg) => HttpResponse::InternalServerError().json(ErrorResponse { error: msg.clone() }),
            AppError::InternalServerError(msg) => HttpResponse::InternalServerError().json(ErrorResponse { error: msg.clone() }),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let details = err
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let errors = errs
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message.as_deref().unwrap_or("")))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: [{}]", field, errors)
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(format!("Validation failed: {}", details))
    }
}
