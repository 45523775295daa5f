//! Error types for sql-object-model

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering and reading SQL sources
#[derive(Error, Debug)]
pub enum ObjectModelError {
    #[error("Failed to read SQL file: {path}")]
    SqlFileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL file is neither UTF-8 nor Windows-1252 text: {path}")]
    InvalidEncoding { path: PathBuf },

    #[error("Invalid file pattern: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Workspace root not found: {path}")]
    WorkspaceNotFound { path: PathBuf },

    #[error("Background task failed: {message}")]
    TaskFailed { message: String },
}

impl From<tokio::task::JoinError> for ObjectModelError {
    fn from(err: tokio::task::JoinError) -> Self {
        ObjectModelError::TaskFailed {
            message: err.to_string(),
        }
    }
}

/// Result alias used by the source and processor layers
pub type ObjectModelResult<T> = Result<T, ObjectModelError>;
