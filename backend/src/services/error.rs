//! Top-level error type of the generation pipeline.
//!
//! Variants follow how a failure must be handled: validation problems are returned
//! before anything is queued, an unreachable solver environment means the job is never
//! queued, execution failures end in a `failed` queue entry, and parse/import failures
//! only affect the import step.

use crate::db::repository::RepositoryError;
use crate::interchange::InterchangeError;
use crate::models::ConstraintError;
use crate::solver::SolverError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Solver environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Solver execution failed: {message}")]
    Execution { message: String, diagnostics: String },

    #[error("Could not read solver output: {0}")]
    Parse(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Interchange(#[from] InterchangeError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Whether the error is a missing entity, wherever it was raised.
    pub fn is_not_found(&self) -> bool {
        match self {
            PipelineError::NotFound(_) => true,
            PipelineError::Repository(e) => e.is_not_found(),
            PipelineError::Storage(StorageError::NotFound(_)) => true,
            _ => false,
        }
    }

    /// Whether the same call may succeed later, e.g. after a repository outage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Repository(e) if e.is_retryable())
    }

    /// Whether the caller sent something unacceptable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::Repository(RepositoryError::ValidationError { .. })
                | PipelineError::Storage(StorageError::InvalidName(_))
                | PipelineError::Interchange(InterchangeError::InvalidDraft(_))
        )
    }
}

impl From<ConstraintError> for PipelineError {
    fn from(err: ConstraintError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

impl From<SolverError> for PipelineError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Unavailable(message) => PipelineError::EnvironmentUnavailable(message),
            other => PipelineError::Execution {
                message: other.to_string(),
                diagnostics: other.diagnostics().to_string(),
            },
        }
    }
}
