//! Base operation adapter.
//!
//! Normalizes a user validation function into the [`ExecutionFn`] contract.
//! An `Err` returned by the function, or a panic while running it, becomes an
//! [`OperationError`]. Results are otherwise passed through unchanged. No
//! timers, retries or cancellation live here.

use crate::error::OperationError;
use crate::strategy::{Execution, ExecutionFn, Invocation};
use armature_validation::{ValidationContext, ValidationResult};
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// User-supplied validation function wrapped for the engine.
pub struct BaseOperation<T> {
    execute: ExecutionFn<T>,
}

impl<T> Clone for BaseOperation<T> {
    fn clone(&self) -> Self {
        Self {
            execute: self.execute.clone(),
        }
    }
}

impl<T> fmt::Debug for BaseOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseOperation").finish_non_exhaustive()
    }
}

impl<T> BaseOperation<T>
where
    T: Send + 'static,
{
    /// Wrap an async validation function.
    pub fn from_async<F, Fut, E>(f: F) -> Self
    where
        F: Fn(T, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ValidationResult<T>, E>> + Send + 'static,
        E: fmt::Display,
    {
        let f = Arc::new(f);
        let execute: ExecutionFn<T> = Arc::new(move |value: T, invocation: Invocation| {
            let f = f.clone();
            async move {
                let started = catch_unwind(AssertUnwindSafe(|| f(value, invocation.context)));
                let future = match started {
                    Ok(future) => future,
                    Err(payload) => return Err(OperationError::panicked(panic_message(payload))),
                };

                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(outcome) => normalize(outcome),
                    Err(payload) => Err(OperationError::panicked(panic_message(payload))),
                }
            }
            .boxed()
        });

        Self { execute }
    }

    /// Wrap a synchronous validation function.
    pub fn from_fn<F, E>(f: F) -> Self
    where
        F: Fn(T, ValidationContext) -> Result<ValidationResult<T>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let f = Arc::new(f);
        let execute: ExecutionFn<T> = Arc::new(move |value: T, invocation: Invocation| {
            let outcome = catch_unwind(AssertUnwindSafe(|| f(value, invocation.context)));
            let execution = match outcome {
                Ok(outcome) => normalize(outcome),
                Err(payload) => Err(OperationError::panicked(panic_message(payload))),
            };
            futures_util::future::ready(execution).boxed()
        });

        Self { execute }
    }

    pub fn into_execution(self) -> ExecutionFn<T> {
        self.execute
    }

    pub fn execution(&self) -> &ExecutionFn<T> {
        &self.execute
    }
}

fn normalize<T, E: fmt::Display>(outcome: Result<ValidationResult<T>, E>) -> Execution<T> {
    outcome.map_err(|error| OperationError::new(error.to_string()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
