use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use devmatch_common::ErrorResponse;
use sled::transaction::TransactionError;
use thiserror::Error;
use tracing::error;

use crate::engine::RelationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    SelfReference(String),

    #[error("Something went wrong: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Duplicate(_) | AppError::SelfReference(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name of the failure kind, sent as the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::Auth(_) => "AuthError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Duplicate(_) => "DuplicateError",
            AppError::SelfReference(_) => "SelfReferenceError",
            AppError::Unexpected(_) => "UnexpectedError",
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Unexpected(cause) => {
                // Cause chain stays in the log; clients only see the kind.
                error!("unexpected failure: {cause:#}");
                ErrorResponse {
                    success: false,
                    message: String::from("Internal server error"),
                    error: self.kind().to_string(),
                }
            }
            other => ErrorResponse {
                success: false,
                message: other.to_string(),
                error: other.kind().to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<RelationError> for AppError {
    fn from(err: RelationError) -> Self {
        let msg = err.to_string();
        match err {
            RelationError::SelfReference => AppError::SelfReference(msg),
            RelationError::NotFound => AppError::NotFound(msg),
            RelationError::Duplicate(_) => AppError::Duplicate(msg),
        }
    }
}

impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Unexpected(err.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Unexpected(err.into())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Unexpected(err.into())
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => e.into(),
        }
    }
}
