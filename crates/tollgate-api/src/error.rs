//! # API Error & Response Envelopes
//!
//! Every JSON response uses one of two envelopes:
//!
//! ```text
//! success: {"success": true,  "data": <payload|null>}
//! error:   {"success": false, "code": "<MACHINE_CODE>", "message": "<text>"}
//! ```
//!
//! [`AppError`] implements `axum::response::IntoResponse` and maps each
//! variant to its HTTP status. Internal error details are logged, never
//! returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_core::MigrationError;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code (e.g., "MIGRATION_REQUIRED", "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorBody {
    /// Build an error body.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Structured JSON success response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    /// Always `true`.
    pub success: bool,
    /// Route-specific payload; `null` when the route has nothing to return.
    pub data: Option<T>,
}

/// A success envelope with an explicit status code.
#[derive(Debug)]
pub struct ApiSuccess<T> {
    status: StatusCode,
    data: Option<T>,
}

impl<T> ApiSuccess<T> {
    /// 200 OK with a payload.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data: Some(data),
        }
    }

    /// Override the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ApiSuccess<()> {
    /// 200 OK with `"data": null`.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// A destructive migration awaits operator confirmation (428).
    #[error("{0}")]
    GateBlocked(&'static str),

    /// The migration collaborator failed while executing (500).
    /// The cause is logged; clients see only the context message.
    #[error("error executing migration: {0}")]
    MigrationFailed(MigrationError),

    /// Dependency unavailable, e.g. the migration status source (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Authentication failure (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::GateBlocked(_) => (StatusCode::PRECONDITION_REQUIRED, "MIGRATION_REQUIRED"),
            Self::MigrationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MIGRATION_FAILED")
            }
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The message placed in the response body.
    fn client_message(&self) -> String {
        match self {
            Self::GateBlocked(text) => (*text).to_string(),
            Self::MigrationFailed(_) => "error executing migration".to_string(),
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::MigrationFailed(cause) => {
                tracing::error!(error = %cause, "migration execution failed")
            }
            _ => {}
        }

        (status, Json(ErrorBody::new(code, self.client_message()))).into_response()
    }
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::StatusUnavailable(reason) => Self::Unavailable(format!(
                "migration status unavailable: {reason}"
            )),
            failed @ MigrationError::ExecutionFailed(_) => Self::MigrationFailed(failed),
        }
    }
}
