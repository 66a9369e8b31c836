// Armature Forms - async validation for Armature
//
// Re-exports the validation result model and the async strategy engine
// under one crate.

pub use armature_async_validation;
pub use armature_validation;

pub use armature_async_validation::{
    AsyncFailure, AsyncValidator, BaseOperation, Clock, ConfigError, ManualClock, OperationError,
    Phase, RetryPolicy, Strategy, TokioClock, ValidatorConfig,
};
pub use armature_validation::{
    AsyncValidate, PathSegment, ValidationContext, ValidationError, ValidationResult,
};

/// Everything needed to declare and run async validators.
pub mod prelude {
    pub use armature_async_validation::{
        ASYNC_CANCELLED, ASYNC_ERROR, ASYNC_TIMEOUT, AsyncValidator, BaseOperation,
        DebounceConfig, RetryPolicy, Strategy, TimeoutConfig, ValidatorConfig,
    };
    pub use armature_validation::{
        AsyncValidate, ValidationContext, ValidationError, ValidationResult,
    };
}
