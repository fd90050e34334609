// Central Error Type for the Application

use crate::domain::{ErrorKind, JobError};
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err.kind {
            ErrorKind::Validation => AppError::Validation(err.message),
            ErrorKind::NotFound => AppError::NotFound(err.message),
            ErrorKind::Rejected => AppError::Rejected(err.message),
            ErrorKind::Execution | ErrorKind::Timeout | ErrorKind::Cancelled => {
                AppError::Execution(err.message)
            }
        }
    }
}

impl AppError {
    /// Stable error kind for boundary layers that only speak `ErrorKind`
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Rejected(_) => ErrorKind::Rejected,
            _ => ErrorKind::Execution,
        }
    }
}
