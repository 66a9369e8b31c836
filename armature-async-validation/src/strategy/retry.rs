//! Retry strategy with exponential backoff.
//!
//! ## Example
//!
//! ```rust
//! use armature_async_validation::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)
//!     .initial_delay(Duration::from_millis(10))
//!     .max_delay(Duration::from_millis(100))
//!     .backoff_multiplier(2.0);
//!
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(10));
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(20));
//! ```
//!
//! Only operation errors are retried. A validation that ran and rejected the
//! value is returned as-is on the first attempt.

use super::{ExecutionFn, Invocation, duration_ms};
use crate::clock::Clock;
use crate::error::AsyncFailure;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl From<u32> for RetryPolicy {
    fn from(max_attempts: u32) -> Self {
        Self::new(max_attempts)
    }
}

impl RetryPolicy {
    /// Create a policy with default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Check the policy without fixing it up.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }

    /// Clamp out-of-range values into a usable policy.
    pub fn normalized(mut self) -> Self {
        if self.max_attempts == 0 {
            warn!("Retry policy max_attempts of 0 clamped to 1");
            self.max_attempts = 1;
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            warn!(
                multiplier = self.backoff_multiplier,
                "Retry policy backoff_multiplier clamped to 1.0"
            );
            self.backoff_multiplier = 1.0;
        }
        self
    }

    /// Delay before attempt `attempt` (1-indexed; attempt 1 has no delay).
    ///
    /// `min(initial_delay * backoff_multiplier^(attempt - 2), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        if nanos <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(nanos.round() as u64).min(self.max_delay)
    }
}

/// Re-run `inner` while it fails with an operation error.
///
/// `inner` runs at most `policy.max_attempts` times, strictly one after the
/// other. Cancellation is checked before each attempt and during each
/// backoff wait.
pub fn retry<T>(
    inner: ExecutionFn<T>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
) -> ExecutionFn<T>
where
    T: Clone + Send + 'static,
{
    let policy = policy.normalized();

    Arc::new(move |value: T, invocation: Invocation| {
        let inner = inner.clone();
        let clock = clock.clone();
        let policy = policy.clone();

        async move {
            let token = invocation.token.clone();
            let operation_id = invocation.operation_id;
            let mut attempt = 0;

            loop {
                if token.is_cancelled() {
                    debug!(operation_id, attempt, "Retry loop cancelled before next attempt");
                    return Ok(AsyncFailure::Cancelled.into_result());
                }

                attempt += 1;
                let error = match inner(value.clone(), invocation.clone()).await {
                    Ok(result) => {
                        if attempt > 1 {
                            debug!(operation_id, attempt, "Retry succeeded");
                        }
                        return Ok(result);
                    }
                    Err(error) => error,
                };

                if attempt >= policy.max_attempts {
                    warn!(
                        operation_id,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %error,
                        "Final retry attempt failed"
                    );
                    return Ok(AsyncFailure::RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    }
                    .into_result());
                }

                let delay = policy.delay_for_attempt(attempt + 1);
                debug!(
                    operation_id,
                    attempt,
                    delay = ?delay,
                    error = %error,
                    "Retry attempt failed, waiting before retry"
                );

                if token.is_cancelled() {
                    return Ok(AsyncFailure::Cancelled.into_result());
                }
                if delay > Duration::ZERO {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(operation_id, attempt, "Retry backoff cancelled");
                            return Ok(AsyncFailure::Cancelled.into_result());
                        }
                        _ = clock.sleep(delay) => {}
                    }
                }
            }
        }
        .boxed()
    })
}
