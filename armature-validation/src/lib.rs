//! Validation result model for Armature
//!
//! Provides the value types every validator in Armature produces and
//! consumes: [`ValidationResult`], [`ValidationError`] and the opaque
//! [`ValidationContext`] handed down by schema engines.
//!
//! # Examples
//!
//! ```
//! use armature_validation::{ValidationError, ValidationResult};
//!
//! let ok = ValidationResult::success("john");
//! assert!(ok.is_success());
//!
//! let failed: ValidationResult<&str> = ValidationResult::failure(
//!     ValidationError::new("string.min", "too short").with_path(["user", "name"]),
//! );
//! assert!(failed.is_failure());
//! assert_eq!(failed.errors()[0].field, "name");
//! ```

mod errors;
mod result;
mod traits;

pub use errors::*;
pub use result::*;
pub use traits::*;
