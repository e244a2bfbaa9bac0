use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already exists")]
    EmailAlreadyExists,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("Password validation failed: {0}")]
    PasswordValidation(String),
    #[error("Email validation failed: {0}")]
    EmailValidation(String),
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing error: {0}")]
    PasswordHashing(#[from] crate::auth::password::PasswordError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AuthError::MissingAuthHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidAuthHeaderFormat => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AuthError::PasswordValidation(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailValidation(_) => StatusCode::BAD_REQUEST,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AuthError::PasswordHashing(err) if err.is_policy_violation() => StatusCode::BAD_REQUEST,
            AuthError::PasswordHashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = match &self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserNotFound => "user_not_found",
            AuthError::EmailAlreadyExists => "email_already_exists",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidResetToken => "invalid_reset_token",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeaderFormat => "invalid_auth_header",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::RateLimitExceeded => "rate_limit_exceeded",
            AuthError::PasswordValidation(_) => "password_validation",
            AuthError::EmailValidation(_) => "email_validation",
            AuthError::Validation(_) => "validation_error",
            AuthError::Database(_) => "database_error",
            AuthError::Jwt(_) => "token_error",
            AuthError::PasswordHashing(err) if err.is_policy_violation() => "password_validation",
            AuthError::PasswordHashing(_) => "password_processing",
            AuthError::Internal(_) => "internal_error",
        };

        // Internal details stay in the logs
        let message = match &self {
            AuthError::Database(err) => {
                tracing::error!("Auth database error: {}", err);
                "Internal server error".to_string()
            }
            AuthError::Internal(err) => {
                tracing::error!("Auth internal error: {:#}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
