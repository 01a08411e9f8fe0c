//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::services::PipelineError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// The solver environment cannot take work right now.
    ServiceUnavailable(String),
    Internal(String),
    Pipeline(PipelineError),
}

impl AppError {
    fn parts(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("SOLVER_UNAVAILABLE", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Pipeline(err) => pipeline_parts(err),
        }
    }
}

fn pipeline_parts(err: PipelineError) -> (StatusCode, ApiError) {
    if err.is_not_found() {
        return (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", err.to_string()));
    }
    if err.is_validation() {
        return (StatusCode::BAD_REQUEST, ApiError::new("VALIDATION_ERROR", err.to_string()));
    }
    match err {
        PipelineError::EnvironmentUnavailable(msg) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new("SOLVER_UNAVAILABLE", msg),
        ),
        PipelineError::Execution { message, diagnostics } => {
            let body = ApiError::new("EXECUTION_ERROR", message);
            let body = if diagnostics.is_empty() {
                body
            } else {
                body.with_details(diagnostics)
            };
            (StatusCode::INTERNAL_SERVER_ERROR, body)
        }
        PipelineError::Parse(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new("PARSE_ERROR", msg)),
        PipelineError::Import(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new("IMPORT_ERROR", msg)),
        PipelineError::Repository(RepositoryError::ConflictError { message, context }) => (
            StatusCode::CONFLICT,
            ApiError::new("CONFLICT", message).with_details(context.to_string()),
        ),
        PipelineError::Repository(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("REPOSITORY_ERROR", e.to_string()),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("INTERNAL_ERROR", other.to_string()),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        (status, Json(error)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Pipeline(err.into())
    }
}
