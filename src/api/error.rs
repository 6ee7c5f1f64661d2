//! API error handling.
//!
//! This module provides error types and response formatting for the API.
//! Error codes are stable identifiers clients branch on; messages are for
//! humans.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::infrastructure::RepositoryError;

/// `If-Match` header absent on a conditional update.
pub const MISSING_VERSION: &str = "VERSAO_FALTANTE";
/// `If-Match` header present but not a non-negative integer.
pub const INVALID_VERSION: &str = "VERSAO_INVALIDA";
/// Expected version differs from the stored one.
pub const CONCURRENCY_CONFLICT: &str = "CONFLITO_CONCORRENCIA";
/// Task absent from the caller's workspace.
pub const NOT_FOUND: &str = "NAO_ENCONTRADO";
/// Unexpected server-side failure.
pub const INTERNAL_ERROR: &str = "ERRO_INTERNO";
/// Request body failed validation.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Caller identity could not be established.
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";

// =============================================================================
// API Error
// =============================================================================

/// API error structure for JSON responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional field-level errors for validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    /// Trace identifier of the request that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: None,
        }
    }

    /// Creates a validation error with field-level details.
    #[must_use]
    pub fn validation(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self {
            details: Some(details),
            ..Self::new(VALIDATION_ERROR, message)
        }
    }
}

/// Field-level error for validation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field that failed validation.
    pub field: String,
    /// Error message for this field.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// API Error Response
// =============================================================================

/// API error response containing status code and error details.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Error details.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Creates a new API error response.
    #[must_use]
    pub const fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }

    /// Attaches the request's trace identifier to the body.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.error.trace_id = Some(trace_id.into());
        self
    }

    /// Creates a 400 Bad Request response.
    #[must_use]
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiError::new(code, message))
    }

    /// Creates a 400 Bad Request response for validation errors.
    #[must_use]
    pub fn validation_error(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiError::validation(message, details),
        )
    }

    #[must_use]
    pub fn missing_version() -> Self {
        Self::bad_request(
            MISSING_VERSION,
            "The If-Match header with the task version is required",
        )
    }

    #[must_use]
    pub fn invalid_version(raw: &str) -> Self {
        Self::bad_request(
            INVALID_VERSION,
            format!("The If-Match header must be a non-negative integer version, got '{raw}'"),
        )
    }

    /// Creates a 401 Unauthorized response.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ApiError::new(UNAUTHORIZED, message))
    }

    /// Creates a 404 Not Found response.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiError::new(NOT_FOUND, message))
    }

    /// Creates a 409 Conflict response for version conflicts.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            ApiError::new(CONCURRENCY_CONFLICT, message),
        )
    }

    /// Creates a 500 Internal Server Error response.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(INTERNAL_ERROR, message),
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<RepositoryError> for ApiErrorResponse {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::not_found(format!("Task {id} not found")),
            RepositoryError::VersionConflict { expected, found } => Self::conflict(format!(
                "The task was modified by another user (expected version {expected}, \
                 current version {found}). Reload the task and try again."
            )),
            RepositoryError::DatabaseError(ref detail) => {
                tracing::error!(error = %detail, "Repository failure");
                Self::internal_error("An internal error occurred")
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Validation error type for request validation.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field-level errors.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub const fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Creates a validation error with a single field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }
}

impl From<ValidationError> for ApiErrorResponse {
    fn from(error: ValidationError) -> Self {
        Self::validation_error("Validation failed", error.errors)
    }
}

// =============================================================================
// Tests
// =============================================================================
