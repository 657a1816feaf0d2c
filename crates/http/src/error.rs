//! Error handling for the Biblioteca HTTP layer

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use biblioteca_authz::AuthError;
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Field name to list of messages, rendered verbatim as a 400 body
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed for {} field(s)", .errors.len())]
    Validation { errors: FieldErrors },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error from a complete field map
    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }

    /// Create a validation error for a single field
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.into(), vec![message.into()]);
        Self::Validation { errors }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "not_authenticated".to_string(),
        }
    }

    /// Create an unauthorized error caused by a rejected token
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "token_not_valid".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("database error"))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Blacklisted => AppError::invalid_token("Token is blacklisted"),
            err if err.is_client_error() => AppError::invalid_token("Token is invalid or expired"),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::Validation { errors } => {
                tracing::info!(fields = ?errors.keys().collect::<Vec<_>>(), "request failed validation");
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            AppError::NotFound { message, code } => (StatusCode::NOT_FOUND, code, message),
            AppError::Unauthorized { message, code } => (StatusCode::UNAUTHORIZED, code, message),
            AppError::BadRequest { message, code } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                format!("{e:#}"),
            ),
        };

        let error_id = Uuid::new_v4();
        let timestamp = Utc::now().to_rfc3339();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                error = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                "Request error"
            );
        }

        // Internal details stay in the logs for release builds
        let message = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR
        {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message,
                "details": [],
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            }
        });

        (status, Json(error_response)).into_response()
    }
}
