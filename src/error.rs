//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Duplicate = 6,
    NotEligible = 10,
    AlreadyBorrowed = 11,
    LoanLimitReached = 12,
    OutOfStock = 13,
    NotActive = 14,
    LoanOverdue = 15,
    RenewalLimitReached = 16,
    AlreadyReturned = 17,
    HoldExists = 18,
    AlreadyCancelled = 19,
    AlreadySettled = 20,
}

/// Circulation rule violations: the request was well-formed but the
/// current state forbids it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CirculationError {
    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("User already has this book on loan")]
    AlreadyBorrowed,

    #[error("Maximum loans reached ({current}/{max})")]
    LoanLimitReached { current: i64, max: i32 },

    #[error("No copies of this book are available")]
    OutOfStock,

    #[error("Loan is not active")]
    NotActive,

    #[error("Overdue loans cannot be renewed")]
    Overdue,

    #[error("Maximum renewals reached ({current}/{max})")]
    RenewalLimitReached { current: i32, max: i32 },

    #[error("Book already returned")]
    AlreadyReturned,

    #[error("User already has an open hold on this book")]
    HoldExists,

    #[error("Hold already cancelled")]
    AlreadyCancelled,

    #[error("Fine is already {0}")]
    AlreadySettled(String),
}

impl CirculationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CirculationError::NotEligible(_) => ErrorCode::NotEligible,
            CirculationError::AlreadyBorrowed => ErrorCode::AlreadyBorrowed,
            CirculationError::LoanLimitReached { .. } => ErrorCode::LoanLimitReached,
            CirculationError::OutOfStock => ErrorCode::OutOfStock,
            CirculationError::NotActive => ErrorCode::NotActive,
            CirculationError::Overdue => ErrorCode::LoanOverdue,
            CirculationError::RenewalLimitReached { .. } => ErrorCode::RenewalLimitReached,
            CirculationError::AlreadyReturned => ErrorCode::AlreadyReturned,
            CirculationError::HoldExists => ErrorCode::HoldExists,
            CirculationError::AlreadyCancelled => ErrorCode::AlreadyCancelled,
            CirculationError::AlreadySettled(_) => ErrorCode::AlreadySettled,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Circulation(#[from] CirculationError),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status, error code and client-facing message
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Circulation(e) => (StatusCode::CONFLICT, e.code(), e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Returns true when a database error is a unique-index violation on `constraint`
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
