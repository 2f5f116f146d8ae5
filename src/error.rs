// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Validation, eligibility, state and permission failures are expected
/// outcomes and are reported to the caller as structured bodies. Upstream
/// and database failures are logged with the collaborator that failed and
/// surfaced only as a generic retryable error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not eligible: {0}")]
    Eligibility(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{service} error during {operation}: {message}")]
    Upstream {
        service: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build an error for a failed payment processor call.
    pub fn stripe(operation: &'static str, message: impl Into<String>) -> Self {
        AppError::Upstream {
            service: "stripe",
            operation,
            message: message.into(),
        }
    }

    /// Whether the caller may reasonably retry the request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Upstream { .. } | AppError::Database(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::Eligibility(msg) => {
                (StatusCode::CONFLICT, "eligibility_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "invalid_state", Some(msg.clone()))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Upstream {
                service,
                operation,
                message,
            } => {
                tracing::error!(service, operation, error = %message, "Upstream call failed");
                (StatusCode::BAD_GATEWAY, "upstream_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::SERVICE_UNAVAILABLE, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
