//! Error types for streaming task execution
//!
//! Every failure that can surface while resolving arguments, running a
//! workflow, or consuming a model stream is represented by [`TaskError`].
//!
//! # Error Hierarchy
//!
//! ```text
//! TaskError
//! ├── Cancelled            - Cooperative cancellation (not a failure)
//! ├── ValidationExhausted  - Every attempt was rejected by the output validator
//! ├── Provider             - Model/network failure from the generation capability
//! ├── ProviderRetry        - Provider-side retry wrapper around the real cause
//! ├── ArgTransform         - Arguments could not be resolved before streaming
//! ├── Tool                 - A tool invoked by the model failed
//! ├── Configuration        - Invalid configuration
//! ├── Serialization        - JSON errors
//! └── Io                   - Filesystem errors
//! ```
//!
//! # Cancellation is not a failure
//!
//! Callers must classify cancellation by variant, never by message text:
//!
//! ```rust
//! use aitask_core::TaskError;
//!
//! fn describe(err: &TaskError) -> &'static str {
//!     if err.is_cancelled() {
//!         "stopped by the user"
//!     } else {
//!         "failed"
//!     }
//! }
//!
//! assert_eq!(describe(&TaskError::Cancelled), "stopped by the user");
//! ```

use thiserror::Error;

/// Convenience result type using [`TaskError`]
pub type Result<T> = std::result::Result<T, TaskError>;

/// Boxed error used as the source of provider failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all task operations
#[derive(Error, Debug)]
pub enum TaskError {
    /// The cancellation token for this run was triggered.
    ///
    /// This is the named cancellation marker. The task registry maps it to the
    /// `Idle` state instead of `Error`.
    #[error("Generation cancelled")]
    Cancelled,

    /// All attempts failed the structural output validator.
    ///
    /// Carries the feedback from the last rejected attempt.
    #[error("Output validation failed after {attempts} attempt(s): {feedback}")]
    ValidationExhausted {
        /// Number of attempts that were made
        attempts: usize,
        /// Feedback produced by the validator for the final attempt
        feedback: String,
    },

    /// Network or model failure reported by the generation capability
    #[error("Provider error: {message}")]
    Provider {
        /// Human-readable description
        message: String,
        /// Underlying cause, when the provider has one
        #[source]
        source: Option<BoxError>,
    },

    /// A provider gave up after retrying internally.
    ///
    /// Use [`TaskError::into_underlying`] to surface the real cause.
    #[error("Provider failed after {attempts} attempt(s). Last error: {last}")]
    ProviderRetry {
        /// Number of attempts made by the provider
        attempts: usize,
        /// The error from the final attempt
        last: Box<TaskError>,
    },

    /// Raw arguments could not be resolved into a prompt context
    #[error("Argument resolution failed: {0}")]
    ArgTransform(String),

    /// A tool called by the model failed
    #[error("Tool '{tool_name}' failed: {message}")]
    Tool {
        /// Name of the failing tool
        tool_name: String,
        /// Error message returned by the tool
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    /// Create a provider error without an underlying source
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Create a provider error wrapping an underlying cause
    pub fn provider_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Provider {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an argument resolution error
    pub fn arg_transform(message: impl Into<String>) -> Self {
        Self::ArgTransform(message.into())
    }

    /// Create a tool failure
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the cancellation marker
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Strip provider retry wrappers down to the error that actually happened.
    pub fn into_underlying(self) -> Self {
        match self {
            Self::ProviderRetry { last, .. } => last.into_underlying(),
            other => other,
        }
    }
}
