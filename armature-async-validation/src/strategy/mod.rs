//! # Execution Strategies
//!
//! Decorators layered on top of a base operation. Each one takes an
//! [`ExecutionFn`] and returns a new [`ExecutionFn`] with the same signature.
//!
//! ## Strategies Included
//!
//! - **Timeout**: Race the inner operation against a timer
//! - **Debounce**: Coalesce bursts of calls into one execution of the latest value
//! - **Retry**: Re-run operations that threw, with exponential backoff
//!
//! Strategies are described by [`Strategy`] values and folded in order by
//! [`compose`]: the last descriptor is the outermost layer and observes
//! everything beneath it.

mod debounce;
mod retry;
mod timeout;

pub use debounce::*;
pub use retry::*;
pub use timeout::*;

use crate::clock::Clock;
use crate::error::OperationError;
use armature_validation::{ValidationContext, ValidationResult};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one layer. `Err` means the operation itself failed to run.
pub type Execution<T> = Result<ValidationResult<T>, OperationError>;

/// The contract every strategy consumes and produces.
pub type ExecutionFn<T> =
    Arc<dyn Fn(T, Invocation) -> BoxFuture<'static, Execution<T>> + Send + Sync>;

/// Per-call data threaded through every layer.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Context from the caller, passed through untouched
    pub context: ValidationContext,
    /// Cancelled when the caller cancels this operation
    pub token: CancellationToken,
    /// Operation id assigned by the lifecycle controller
    pub operation_id: u64,
}

impl Invocation {
    /// Invocation that is never cancelled; handy for driving a layer directly.
    pub fn detached(context: ValidationContext) -> Self {
        Self {
            context,
            token: CancellationToken::new(),
            operation_id: 0,
        }
    }
}

/// Descriptor for one strategy layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    Timeout(TimeoutConfig),
    Debounce(DebounceConfig),
    Retry(RetryPolicy),
}

impl Strategy {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Debounce(_) => "debounce",
            Self::Retry(_) => "retry",
        }
    }

    /// Wrap `inner` in this strategy. State (debounce windows) is fresh for
    /// every call, so two composed chains never share it.
    pub fn apply<T>(&self, inner: ExecutionFn<T>, clock: Arc<dyn Clock>) -> ExecutionFn<T>
    where
        T: Clone + Send + 'static,
    {
        match self {
            Self::Timeout(config) => timeout(inner, config.clone(), clock),
            Self::Debounce(config) => debounce(inner, config.clone(), clock),
            Self::Retry(policy) => retry(inner, policy.clone(), clock),
        }
    }
}

impl From<TimeoutConfig> for Strategy {
    fn from(config: TimeoutConfig) -> Self {
        Self::Timeout(config)
    }
}

impl From<DebounceConfig> for Strategy {
    fn from(config: DebounceConfig) -> Self {
        Self::Debounce(config)
    }
}

impl From<RetryPolicy> for Strategy {
    fn from(policy: RetryPolicy) -> Self {
        Self::Retry(policy)
    }
}

/// Fold `strategies` over `base` in order.
pub fn compose<T>(
    base: ExecutionFn<T>,
    strategies: &[Strategy],
    clock: &Arc<dyn Clock>,
) -> ExecutionFn<T>
where
    T: Clone + Send + 'static,
{
    strategies
        .iter()
        .fold(base, |inner, strategy| strategy.apply(inner, clock.clone()))
}

/// Serde helpers for millisecond durations in configuration.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseOperation;
    use crate::clock::ManualClock;
    use std::convert::Infallible;
    use std::time::Duration;

    #[test]
    fn test_strategy_serde_tagging() {
        let strategy: Strategy = serde_json::from_value(serde_json::json!({
            "strategy": "debounce",
            "duration_ms": 150,
        }))
        .unwrap();

        assert_eq!(
            strategy,
            Strategy::Debounce(DebounceConfig::new(Duration::from_millis(150)))
        );
        assert_eq!(strategy.name(), "debounce");
    }

    #[tokio::test]
    async fn test_compose_without_strategies_is_base() {
        let base: ExecutionFn<u32> = BaseOperation::from_fn(|n: u32, _| {
            Ok::<_, Infallible>(ValidationResult::success(n + 1))
        })
        .into_execution();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());

        let composed = compose(base, &[], &clock);
        let result = composed(1, Invocation::detached(ValidationContext::new())).await;

        assert_eq!(result.unwrap().into_data(), Some(2));
    }
}
