//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every workflow and store operation returns `Result<T, AppError>`, so each failure kind
//! (duplicate records, bad credentials, rejected tokens, missing or foreign resources,
//! account state checks) is an explicit value the caller has to handle.
//!
//! `AppError` implements `actix_web::error::ResponseError`, which maps each kind onto a
//! stable HTTP status and a JSON body of the form `{"detail": "..."}`.
//! `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `bcrypt::BcryptError` and `actix_web::error::BlockingError` allow the `?` operator
//! to be used across layers.

use actix_web::{
    error::{BlockingError, ResponseError},
    http::{header, StatusCode},
    HttpResponse,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// A uniqueness rule was violated (HTTP 409).
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Credentials were missing or wrong (HTTP 401).
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),
    /// A security token failed signature, expiry or kind checks (HTTP 401).
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    /// The resource does not exist, or belongs to another user (HTTP 404).
    /// Both cases are reported identically.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The account has been deactivated (HTTP 403).
    #[error("Inactive user: {0}")]
    InactiveUser(String),
    /// The account's email address has not been verified (HTTP 403).
    #[error("Unverified user: {0}")]
    UnverifiedUser(String),
    /// Represents a client-side error due to a malformed or invalid request (HTTP 400).
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Represents an error due to failed input validation (HTTP 422 Unprocessable Entity).
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// The client exceeded its request quota (HTTP 429).
    #[error("Too many requests, retry after {retry_after}s")]
    TooManyRequests { retry_after: u64 },
    /// Represents an error originating from database operations (HTTP 500).
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// Represents an unexpected server-side error (HTTP 500).
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn inactive_user() -> Self {
        AppError::InactiveUser("User account is inactive".into())
    }

    pub fn unverified_user() -> Self {
        AppError::UnverifiedUser(
            "Email not verified. Please verify your email to access this resource.".into(),
        )
    }

    /// Message exposed to the client. Server-side failures are logged and
    /// replaced with a generic message.
    fn client_message(&self) -> String {
        match self {
            AppError::AlreadyExists(msg)
            | AppError::AuthenticationError(msg)
            | AppError::InvalidToken(msg)
            | AppError::NotFound(msg)
            | AppError::InactiveUser(msg)
            | AppError::UnverifiedUser(msg)
            | AppError::BadRequest(msg)
            | AppError::ValidationError(msg) => msg.clone(),
            AppError::TooManyRequests { .. } => {
                "Too many requests. Please try again later.".into()
            }
            AppError::DatabaseError(_) => "Database error occurred".into(),
            AppError::InternalServerError(_) => "Internal server error".into(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::AuthenticationError(_) | AppError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InactiveUser(_) | AppError::UnverifiedUser(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let mut builder = HttpResponse::build(status);
        match self {
            AppError::AuthenticationError(_) | AppError::InvalidToken(_) => {
                builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            AppError::TooManyRequests { retry_after } => {
                builder.insert_header((header::RETRY_AFTER, retry_after.to_string()));
            }
            _ => {}
        }

        builder.json(json!({ "detail": self.client_message() }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound` and unique-constraint violations become
/// `AlreadyExists`; everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::AlreadyExists(match db_err.constraint() {
                    Some("users_email_key") => "Email already registered".into(),
                    Some("users_username_key") => "Username already taken".into(),
                    Some("uq_user_category_name") => "Category already exists".into(),
                    _ => "Resource already exists".into(),
                })
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(format!("Password hashing failed: {}", error))
    }
}

impl From<BlockingError> for AppError {
    fn from(error: BlockingError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
