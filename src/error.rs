//! Application error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{auth::jwt::TokenError, bookings::status::BookingStatus};

/// Coarse classification every [`AppError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    NotFound,
    Dependency,
    Internal,
}

/// Failure of something outside the process: the database or the geocoding API.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("database error: {0}")]
    Database(#[source] anyhow::Error),
    #[error("geocoding error: {0}")]
    Geocoding(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("password must be at least 8 characters")]
    WeakPassword,

    #[error("invalid email format")]
    BadEmailFormat,

    #[error("{0}")]
    Validation(String),

    #[error("cannot change booking status from {from} to {to}")]
    InvalidStatusTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid location")]
    InvalidLocation,

    #[error("email already exists")]
    EmailExists,

    #[error("username already exists")]
    UsernameExists,

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("stored credential is corrupt")]
    CorruptCredential,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::WeakPassword
            | AppError::BadEmailFormat
            | AppError::Validation(_)
            | AppError::InvalidStatusTransition { .. }
            | AppError::InvalidLocation => ErrorKind::Validation,
            AppError::EmailExists | AppError::UsernameExists | AppError::Conflict(_) => {
                ErrorKind::Conflict
            }
            AppError::InvalidCredentials | AppError::Token(_) | AppError::Forbidden => {
                ErrorKind::Auth
            }
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Dependency(_) => ErrorKind::Dependency,
            AppError::CorruptCredential | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Dependency(DependencyError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Auth => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Dependency => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to hand to the client. Dependency and internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Dependency(DependencyError::Timeout(op)) => {
                error!(op, "dependency timed out");
                "upstream dependency timed out".into()
            }
            AppError::Dependency(e) => {
                error!(error = %e, "dependency failure");
                "upstream dependency unavailable".into()
            }
            AppError::CorruptCredential | AppError::Internal(_) => {
                error!(error = ?self, "internal error");
                "internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
