use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::services::ai_client::AssistantError;

pub type ApiResult<T> = Result<T, ApiError>;

/// SQLSTATE 23505, raised when a unique index rejects a write
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("AI assistant is not configured")]
    AssistantUnavailable,
    #[error("AI assistant error: {0}")]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AssistantUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Assistant(_) => StatusCode::BAD_GATEWAY,
            ApiError::Auth(err) => err.status_code(),
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::AssistantUnavailable => "assistant_unavailable",
            ApiError::Assistant(_) => "assistant_error",
            ApiError::Auth(_) => "auth_error",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Auth(err) = self {
            return err.into_response();
        }

        let status = self.status_code();
        let message = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                "Internal server error".to_string()
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                "Internal server error".to_string()
            }
            ApiError::Assistant(err) => {
                tracing::warn!("AI provider error: {}", err);
                "The AI assistant could not complete the request".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.error_code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
