//! Error taxonomy for async validation.
//!
//! Strategies never let an error escape as a panic or an unresolved future.
//! [`OperationError`] is the typed "thrown" channel between layers, and
//! [`AsyncFailure`] turns every failure kind into a [`ValidationResult`].

use armature_validation::{ValidationError, ValidationResult};
use std::time::Duration;
use thiserror::Error;

/// Error code for a base operation that threw, panicked or exhausted its retries.
pub const ASYNC_ERROR: &str = "async.error";

/// Error code for a timeout injected by the timeout strategy.
pub const ASYNC_TIMEOUT: &str = "async.timeout";

/// Error code for a cancelled or abandoned operation.
pub const ASYNC_CANCELLED: &str = "async.cancelled";

/// The base operation failed to run (as opposed to rejecting the value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
    panicked: bool,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: false,
        }
    }

    /// Error recovered from a panic inside the base operation.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            message: format!("operation panicked: {}", message.into()),
            panicked: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_panic(&self) -> bool {
        self.panicked
    }
}

/// Every way the engine itself can fail a validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsyncFailure {
    /// Base operation threw or rejected.
    #[error("{0}")]
    Operation(OperationError),

    /// Timeout strategy won the race.
    #[error("{message}")]
    Timeout { duration: Duration, message: String },

    /// Retry strategy ran out of attempts.
    #[error("{last_error} (after {attempts} attempts)")]
    RetryExhausted {
        attempts: u32,
        last_error: OperationError,
    },

    /// Cancelled by the caller, or abandoned by the task driving it.
    #[error("validation cancelled")]
    Cancelled,
}

impl AsyncFailure {
    /// Timeout failure with the default message.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout {
            duration,
            message: default_timeout_message(duration),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Operation(_) | Self::RetryExhausted { .. } => ASYNC_ERROR,
            Self::Timeout { .. } => ASYNC_TIMEOUT,
            Self::Cancelled => ASYNC_CANCELLED,
        }
    }

    pub fn to_validation_error(&self) -> ValidationError {
        ValidationError::new(self.code(), self.to_string())
    }

    /// Failure result carrying exactly one error for this failure.
    pub fn into_result<T>(self) -> ValidationResult<T> {
        ValidationResult::failure(self.to_validation_error())
    }
}

impl From<OperationError> for AsyncFailure {
    fn from(error: OperationError) -> Self {
        Self::Operation(error)
    }
}

pub(crate) fn default_timeout_message(duration: Duration) -> String {
    format!("validation timeout after {}ms", duration.as_millis())
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(AsyncFailure::Operation(OperationError::new("x")).code(), ASYNC_ERROR);
        assert_eq!(AsyncFailure::timeout(Duration::from_millis(5)).code(), ASYNC_TIMEOUT);
        assert_eq!(AsyncFailure::Cancelled.code(), ASYNC_CANCELLED);
        assert_eq!(
            AsyncFailure::RetryExhausted {
                attempts: 3,
                last_error: OperationError::new("x"),
            }
            .code(),
            ASYNC_ERROR
        );
    }

    #[test]
    fn test_operation_failure_keeps_message() {
        let result: ValidationResult<()> =
            AsyncFailure::from(OperationError::new("connection refused")).into_result();

        assert!(result.is_failure());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].code, ASYNC_ERROR);
        assert!(result.errors()[0].message.contains("connection refused"));
        assert_eq!(result.errors()[0].field, "");
    }

    #[test]
    fn test_messages() {
        assert!(AsyncFailure::timeout(Duration::from_millis(250))
            .to_string()
            .contains("timeout"));
        assert!(AsyncFailure::Cancelled.to_string().contains("cancelled"));

        let exhausted = AsyncFailure::RetryExhausted {
            attempts: 4,
            last_error: OperationError::new("503 from upstream"),
        };
        assert_eq!(exhausted.to_string(), "503 from upstream (after 4 attempts)");
    }

    #[test]
    fn test_panicked_operation_error() {
        let error = OperationError::panicked("index out of bounds");
        assert!(error.is_panic());
        assert!(error.message().contains("index out of bounds"));
    }
}
