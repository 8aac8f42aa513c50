//! Domain errors and their HTTP representation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Unique-constraint violations become `Conflict`, other store errors stay `Db`.
    pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(message.to_string())
            }
            _ => AppError::Db(e),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::BadRequest { .. } => ErrorCode::BadRequest,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::Db(_) | AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    BadRequest,
    NotFound,
    Conflict,
    Unauthorized,
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub request_id: String,
}

/// An [`AppError`] bound to the request it happened in.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: AppError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let code = self.error.code();
        let (message, details) = match &self.error {
            AppError::Validation { field, message } => {
                (message.clone(), Some(serde_json::json!({ "field": field })))
            }
            AppError::BadRequest { message, details } => (message.clone(), details.clone()),
            AppError::NotFound(m) | AppError::Conflict(m) => (m.clone(), None),
            AppError::Unauthorized => ("Unauthorized".to_string(), None),
            // the cause stays in the logs
            AppError::Db(_) | AppError::Internal(_) => ("Internal server error".to_string(), None),
        };
        ErrorBody {
            code,
            message,
            details,
            request_id: self.request_id.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.code().status();
        if status.is_server_error() {
            error!(error = %self.error, request_id = %self.request_id, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
