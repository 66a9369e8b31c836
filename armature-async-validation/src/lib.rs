//! Async validation strategies for Armature
//!
//! Wraps a user validation function (often a remote lookup) in composable
//! execution strategies and tracks whether a validation is in flight.
//!
//! - [`BaseOperation`] normalizes the user function, turning returned errors
//!   and panics into [`OperationError`]s.
//! - [`Strategy`] layers ([`timeout`], [`debounce`], [`retry`]) wrap the
//!   operation; the last one applied is outermost.
//! - [`AsyncValidator`] owns the composed chain and a [`Lifecycle`] that
//!   answers `is_pending`, supports `cancel` and `wait_for_completion`, and
//!   guarantees every call resolves exactly once.
//! - All timers go through a [`Clock`]. [`TokioClock`] is the default;
//!   [`ManualClock`] makes time fully deterministic in tests.
//!
//! # Examples
//!
//! ```
//! use armature_async_validation::{AsyncValidator, RetryPolicy};
//! use armature_validation::{ValidationContext, ValidationError, ValidationResult};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let validator = AsyncValidator::from_async(|email: String, _ctx| async move {
//!     if email.ends_with("@example.com") {
//!         Ok::<_, std::io::Error>(ValidationResult::success(email))
//!     } else {
//!         Ok(ValidationResult::failure(ValidationError::new(
//!             "email.domain",
//!             "unsupported domain",
//!         )))
//!     }
//! })
//! .named("email")
//! .retry(RetryPolicy::new(3).initial_delay(Duration::from_millis(10)))
//! .timeout(Duration::from_secs(2));
//!
//! let result = validator
//!     .validate_async("bob@other.org".to_string(), ValidationContext::new())
//!     .await;
//! assert!(result.has_code("email.domain"));
//! # }
//! ```

mod base;
mod clock;
mod config;
mod error;
mod lifecycle;
pub mod strategy;
mod validator;

pub use base::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use strategy::{
    DebounceConfig, Execution, ExecutionFn, Invocation, RetryPolicy, Strategy, TimeoutConfig,
    compose, debounce, retry, timeout,
};
pub use validator::*;
