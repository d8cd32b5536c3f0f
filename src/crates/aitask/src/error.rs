//! Error types for the application layer
//!
//! Task execution failures live in [`aitask_core::TaskError`]. [`AppError`]
//! covers what happens around a task: loading configuration, reading data
//! fixtures, and querying the data store.

use aitask_core::TaskError;
use thiserror::Error;

/// Result type alias for application operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Main error type for application operations
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The data store failed to answer a query
    #[error("Data store error: {0}")]
    Store(String),

    /// Task execution error
    #[error(transparent)]
    Task(#[from] TaskError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a data store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

impl From<AppError> for TaskError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Task(inner) => inner,
            AppError::Config(message) => TaskError::Configuration(message),
            other => TaskError::arg_transform(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_become_arg_transform_failures() {
        let err: TaskError = AppError::store("database locked").into();
        assert!(matches!(err, TaskError::ArgTransform(ref m) if m.contains("database locked")));
    }

    #[test]
    fn test_task_errors_round_trip() {
        let err: TaskError = AppError::from(TaskError::Cancelled).into();
        assert!(err.is_cancelled());
    }
}
