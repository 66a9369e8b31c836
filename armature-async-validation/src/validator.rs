//! Composable async validator.

use crate::base::BaseOperation;
use crate::clock::{Clock, TokioClock};
use crate::config::ValidatorConfig;
use crate::error::{AsyncFailure, ConfigError};
use crate::lifecycle::{Lifecycle, PendingState, Phase};
use crate::strategy::{
    DebounceConfig, ExecutionFn, Invocation, RetryPolicy, Strategy, TimeoutConfig, compose,
};
use armature_validation::{AsyncValidate, ValidationContext, ValidationResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Async validator built from a base operation and an ordered list of
/// strategies.
///
/// Each strategy method returns a new validator whose chain wraps the
/// previous one, so the last strategy applied is the outermost. Every
/// validator owns its own lifecycle and debounce state; nothing is shared
/// with the validator it was built from.
///
/// ## Example
///
/// ```rust
/// use armature_async_validation::AsyncValidator;
/// use armature_validation::{ValidationContext, ValidationError, ValidationResult};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let validator = AsyncValidator::from_async(|name: String, _ctx| async move {
///     if name == "admin" {
///         Ok::<_, std::io::Error>(ValidationResult::failure(ValidationError::new(
///             "username.taken",
///             "username is taken",
///         )))
///     } else {
///         Ok(ValidationResult::success(name))
///     }
/// })
/// .retry(3)
/// .timeout(Duration::from_secs(1));
///
/// let result = validator
///     .validate_async("alice".to_string(), ValidationContext::new())
///     .await;
/// assert!(result.is_success());
/// assert!(!validator.is_pending());
/// # }
/// ```
pub struct AsyncValidator<T: Clone> {
    name: Option<String>,
    base: ExecutionFn<T>,
    strategies: Vec<Strategy>,
    clock: Arc<dyn Clock>,
    execute: ExecutionFn<T>,
    lifecycle: Arc<Lifecycle<T>>,
}

impl<T> AsyncValidator<T>
where
    T: Clone + Send + 'static,
{
    /// Validator over `base` using the Tokio clock.
    pub fn new(base: BaseOperation<T>) -> Self {
        let base = base.into_execution();
        Self {
            name: None,
            execute: base.clone(),
            base,
            strategies: Vec::new(),
            clock: TokioClock::shared(),
            lifecycle: Arc::new(Lifecycle::new(None)),
        }
    }

    /// Validator over an async function.
    pub fn from_async<F, Fut, E>(f: F) -> Self
    where
        F: Fn(T, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ValidationResult<T>, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self::new(BaseOperation::from_async(f))
    }

    /// Validator over a synchronous function.
    pub fn from_fn<F, E>(f: F) -> Self
    where
        F: Fn(T, ValidationContext) -> Result<ValidationResult<T>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self::new(BaseOperation::from_fn(f))
    }

    /// Validator over `base` with the strategies described by `config`.
    pub fn from_config(
        base: BaseOperation<T>,
        config: &ValidatorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut validator = Self::new(base);
        validator.name = config.name.clone();
        validator.strategies = config.strategies.clone();
        Ok(validator.rebuild())
    }

    /// Name used in log events.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.rebuild()
    }

    /// Schedule timers on `clock` instead of the Tokio timer.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild()
    }

    /// Fail with a timeout error if the chain so far takes longer than `duration`.
    pub fn timeout(self, duration: Duration) -> Self {
        self.strategy(TimeoutConfig::new(duration))
    }

    /// Like [`timeout`](Self::timeout) with a custom error message.
    pub fn timeout_with_message(self, duration: Duration, message: impl Into<String>) -> Self {
        self.strategy(TimeoutConfig::new(duration).message(message))
    }

    /// Coalesce calls arriving less than `duration` apart.
    pub fn debounce(self, duration: Duration) -> Self {
        self.strategy(DebounceConfig::new(duration))
    }

    /// Retry operation errors. Accepts a bare attempt count or a full policy.
    pub fn retry(self, policy: impl Into<RetryPolicy>) -> Self {
        self.strategy(policy.into())
    }

    /// Append any strategy descriptor as the new outermost layer.
    pub fn strategy(mut self, strategy: impl Into<Strategy>) -> Self {
        self.strategies.push(strategy.into());
        self.rebuild()
    }

    /// Strategy descriptors, innermost first.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    fn rebuild(mut self) -> Self {
        self.execute = compose(self.base.clone(), &self.strategies, &self.clock);
        self.lifecycle = Arc::new(Lifecycle::new(self.name.clone()));
        self
    }

    /// Run the composed chain for `value`.
    ///
    /// The operation starts (and the validator becomes pending) when this is
    /// called; the returned future drives it to completion. It always
    /// resolves, with exactly one result: a cancelled operation resolves as
    /// an `async.cancelled` failure and an operation error as `async.error`.
    ///
    /// With the default [`TokioClock`] this must be called within a Tokio
    /// runtime.
    pub fn validate_async(
        &self,
        value: T,
        context: ValidationContext,
    ) -> impl Future<Output = ValidationResult<T>> + Send + use<T> {
        let operation = self.lifecycle.begin();
        let token = operation.token().clone();
        let invocation = Invocation {
            context,
            token: token.clone(),
            operation_id: operation.id(),
        };
        let execution = (self.execute)(value, invocation);

        async move {
            let execution = tokio::select! {
                biased;
                _ = token.cancelled() => Ok(AsyncFailure::Cancelled.into_result()),
                execution = execution => execution,
            };
            let result = execution.unwrap_or_else(|error| AsyncFailure::from(error).into_result());

            operation.settle(&result);
            result
        }
    }

    /// Cancel the current operation, if any.
    pub fn cancel(&self) {
        self.lifecycle.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.lifecycle.is_pending()
    }

    /// Resolves once the current operation (if any) is no longer pending.
    pub async fn wait_for_completion(&self) {
        self.lifecycle.wait_for_completion().await
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.state().phase
    }

    pub fn pending_state(&self) -> PendingState {
        self.lifecycle.state()
    }

    /// Result of the most recent operation that settled while current.
    pub fn last_result(&self) -> Option<ValidationResult<T>> {
        self.lifecycle.last_result()
    }
}

impl<T: Clone> fmt::Debug for AsyncValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncValidator")
            .field("name", &self.name)
            .field("strategies", &self.strategies)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> AsyncValidate<T> for AsyncValidator<T>
where
    T: Clone + Send + 'static,
{
    async fn validate_async(&self, value: T, context: ValidationContext) -> ValidationResult<T> {
        AsyncValidator::validate_async(self, value, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{ASYNC_CANCELLED, ASYNC_ERROR};
    use std::convert::Infallible;
    use tokio_test::{assert_pending, assert_ready, task};

    fn never_ready(clock: ManualClock) -> AsyncValidator<u32> {
        AsyncValidator::from_async(move |value: u32, _| {
            let sleep = clock.sleep(Duration::from_secs(3600));
            async move {
                sleep.await;
                Ok::<_, Infallible>(ValidationResult::success(value))
            }
        })
    }

    #[test]
    fn test_strategies_keep_call_order() {
        let validator = AsyncValidator::from_fn(|v: u32, _| {
            Ok::<_, Infallible>(ValidationResult::success(v))
        })
        .with_clock(Arc::new(ManualClock::new()))
        .debounce(Duration::from_millis(10))
        .retry(2)
        .timeout(Duration::from_millis(50));

        let names: Vec<_> = validator.strategies().iter().map(Strategy::name).collect();
        assert_eq!(names, vec!["debounce", "retry", "timeout"]);
    }

    #[test]
    fn test_pending_until_settled() {
        let clock = ManualClock::new();
        let validator = AsyncValidator::from_async({
            let clock = clock.clone();
            move |value: u32, _| {
                let sleep = clock.sleep(Duration::from_millis(5));
                async move {
                    sleep.await;
                    Ok::<_, Infallible>(ValidationResult::success(value))
                }
            }
        })
        .with_clock(Arc::new(clock.clone()));

        let mut call = task::spawn(validator.validate_async(1, ValidationContext::new()));
        assert!(validator.is_pending());
        assert_eq!(validator.phase(), Phase::Pending);
        assert_pending!(call.poll());

        clock.advance(Duration::from_millis(5));
        let result = assert_ready!(call.poll());

        assert!(result.is_success());
        assert!(!validator.is_pending());
        assert_eq!(validator.last_result(), Some(result));
    }

    #[test]
    fn test_cancel_resolves_bare_operation() {
        let clock = ManualClock::new();
        let validator = never_ready(clock.clone()).with_clock(Arc::new(clock.clone()));

        let mut call = task::spawn(validator.validate_async(1, ValidationContext::new()));
        assert_pending!(call.poll());

        validator.cancel();
        assert!(call.is_woken());
        let result = assert_ready!(call.poll());

        assert!(result.has_code(ASYNC_CANCELLED));
        assert!(result.errors()[0].message.contains("cancelled"));
        assert!(!validator.is_pending());
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_operation_error_becomes_failure() {
        let validator = AsyncValidator::from_fn(|_: u32, _| {
            Err::<ValidationResult<u32>, _>("db connection lost")
        })
        .with_clock(Arc::new(ManualClock::new()));

        let mut call = task::spawn(validator.validate_async(1, ValidationContext::new()));
        let result = assert_ready!(call.poll());

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].code, ASYNC_ERROR);
        assert!(result.errors()[0].message.contains("db connection lost"));
    }

    #[test]
    fn test_new_call_not_affected_by_stale_cancel() {
        let clock = ManualClock::new();
        let validator = AsyncValidator::from_fn(|v: u32, _| {
            Ok::<_, Infallible>(ValidationResult::success(v))
        })
        .with_clock(Arc::new(clock.clone()))
        .retry(RetryPolicy::new(2));

        let first = validator.validate_async(1, ValidationContext::new());
        validator.cancel();
        let mut first = task::spawn(first);
        assert!(assert_ready!(first.poll()).has_code(ASYNC_CANCELLED));

        let mut second = task::spawn(validator.validate_async(2, ValidationContext::new()));
        assert_eq!(assert_ready!(second.poll()).into_data(), Some(2));
    }

    #[test]
    fn test_dropping_call_leaves_validator_idle() {
        let clock = ManualClock::new();
        let validator = never_ready(clock.clone()).with_clock(Arc::new(clock.clone()));

        let mut call = task::spawn(validator.validate_async(1, ValidationContext::new()));
        assert_pending!(call.poll());
        drop(call);

        assert!(!validator.is_pending());
        assert_eq!(clock.pending_timers(), 0);
    }
}
