// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Coarse failure category, used by callers that only care about the reason class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidState,
    Validation,
    Conflict,
    Internal,
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed or rule-breaking input)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (authenticated, but the role does not allow it)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate email)
    Conflict(String),

    // 409 The quiz's attempt ceiling has been reached for this user
    AttemptLimitExceeded { max_attempts: i64 },

    // 409 The attempt is no longer accepting answers or grades
    AttemptClosed(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InternalServerError(_) => ErrorKind::Internal,
            AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::AuthError(_) | AppError::Forbidden(_) => ErrorKind::Unauthorized,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::AttemptLimitExceeded { .. } | AppError::AttemptClosed(_) => {
                ErrorKind::InvalidState
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AttemptLimitExceeded { max_attempts } => {
                write!(f, "Attempt limit of {} reached", max_attempts)
            }
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            err @ AppError::AttemptLimitExceeded { .. } => (StatusCode::CONFLICT, err.to_string()),
            AppError::AttemptClosed(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationError> for AppError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        AppError::BadRequest(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_state_errors() {
        assert_eq!(
            AppError::AttemptLimitExceeded { max_attempts: 2 }.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AppError::AttemptClosed("done".to_string()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(AppError::Forbidden("no".to_string()).kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_limit_message() {
        let err = AppError::AttemptLimitExceeded { max_attempts: 3 };
        assert_eq!(err.to_string(), "Attempt limit of 3 reached");
    }
}
