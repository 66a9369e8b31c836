//! Timeout strategy.
//!
//! ## Example
//!
//! ```rust,ignore
//! use armature_async_validation::AsyncValidator;
//! use std::time::Duration;
//!
//! let validator = AsyncValidator::from_async(check_username)
//!     .timeout(Duration::from_secs(2));
//! ```
//!
//! The inner operation is polled before the timer on every wake-up, so when
//! both are ready in the same poll the operation's own result wins. A zero
//! duration therefore keeps results that are ready immediately and times out
//! anything that has to wait.

use super::{ExecutionFn, Invocation, duration_ms};
use crate::clock::Clock;
use crate::error::{AsyncFailure, default_timeout_message};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout duration.
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    /// Message for the timeout error; defaults to one mentioning "timeout".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            message: None,
        }
    }

    /// Set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn failure(&self) -> AsyncFailure {
        AsyncFailure::Timeout {
            duration: self.duration,
            message: self
                .message
                .clone()
                .unwrap_or_else(|| default_timeout_message(self.duration)),
        }
    }
}

/// Race `inner` against a timer of `config.duration`.
///
/// The losing side is dropped: an abandoned operation's result is never
/// surfaced, and a beaten timer is cancelled.
pub fn timeout<T>(
    inner: ExecutionFn<T>,
    config: TimeoutConfig,
    clock: Arc<dyn Clock>,
) -> ExecutionFn<T>
where
    T: Clone + Send + 'static,
{
    Arc::new(move |value: T, invocation: Invocation| {
        let operation_id = invocation.operation_id;
        let operation = inner(value, invocation);
        let deadline = clock.sleep(config.duration);
        let config = config.clone();

        async move {
            tokio::select! {
                biased;
                result = operation => result,
                _ = deadline => {
                    warn!(
                        operation_id,
                        duration = ?config.duration,
                        "Validation timed out"
                    );
                    Ok(config.failure().into_result())
                }
            }
        }
        .boxed()
    })
}
