// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error reported by the BaaS (table API, auth server or management API).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaasError {
    /// HTTP status of the failed call (0 when the request never completed)
    pub status: u16,
    /// Machine-readable code, e.g. `PGRST116` or Postgres `23505`
    pub code: Option<String>,
    /// Human-readable message as sent by the BaaS
    pub message: String,
}

impl std::fmt::Display for BaasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}, HTTP {})", self.message, code, self.status),
            None if self.status == 0 => write!(f, "{}", self.message),
            None => write!(f, "{} (HTTP {})", self.message, self.status),
        }
    }
}

/// The several shapes of error body the BaaS services return.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

impl BaasError {
    /// Transport-level failure (connection refused, timeout, ...).
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self {
            status: 0,
            code: None,
            message: err.to_string(),
        }
    }

    /// Build from a non-success response's status and raw body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let code = parsed.error_code.or_else(|| {
            parsed.code.and_then(|c| match c {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        });

        let message = parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .or(parsed.details)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        Self {
            status,
            code,
            message,
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("BaaS error: {0}")]
    Baas(BaasError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The write referenced a column the table does not have.
    pub fn is_missing_column(&self) -> bool {
        matches!(self, AppError::Baas(e)
            if matches!(e.code.as_deref(), Some("PGRST204") | Some("42703")))
    }

    /// A unique constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, AppError::Baas(e)
            if e.code.as_deref() == Some("23505") || e.status == 409)
    }

    /// The BaaS reported that the requested row does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::NotFound(_) => true,
            AppError::Baas(e) => e.status == 404 || e.code.as_deref() == Some("PGRST116"),
            _ => false,
        }
    }

    /// The message shown to people, i.e. the BaaS's raw message when there is one.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Baas(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<BaasError> for AppError {
    fn from(err: BaasError) -> Self {
        AppError::Baas(err)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Baas(err) => {
                tracing::warn!(error = %err, "BaaS call failed");
                let status = match err.status {
                    400 | 422 => StatusCode::BAD_REQUEST,
                    401 | 403 => StatusCode::FORBIDDEN,
                    404 => StatusCode::NOT_FOUND,
                    409 => StatusCode::CONFLICT,
                    _ if self.is_not_found() => StatusCode::NOT_FOUND,
                    _ if self.is_unique_violation() => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, "baas_error", Some(err.message.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
