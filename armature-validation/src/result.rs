// Validation results

use crate::ValidationError;
use serde::Serialize;

/// Code used when a failure is built from an empty error list.
pub const VALIDATION_FAILED: &str = "validation.failed";

/// Outcome of validating a value.
///
/// `is_success()` is true exactly when there are no errors. The fields are
/// private so that invariant holds for every value of this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult<T> {
    success: bool,
    data: Option<T>,
    errors: Vec<ValidationError>,
}

impl<T> ValidationResult<T> {
    /// Successful result carrying the (possibly transformed) value
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Failed result with a single error
    pub fn failure(error: ValidationError) -> Self {
        Self {
            success: false,
            data: None,
            errors: vec![error],
        }
    }

    /// Failed result with several errors.
    ///
    /// An empty list still produces a failure, with a generic
    /// `validation.failed` error.
    pub fn failures(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            return Self::failure(ValidationError::new(VALIDATION_FAILED, "validation failed"));
        }
        Self {
            success: false,
            data: None,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether any error carries `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Transform the successful value, keeping errors untouched
    pub fn map<U, F>(self, f: F) -> ValidationResult<U>
    where
        F: FnOnce(T) -> U,
    {
        ValidationResult {
            success: self.success,
            data: self.data.map(f),
            errors: self.errors,
        }
    }

    /// Convert into the `Result` shape used by the `Validate` traits
    pub fn into_result(self) -> Result<T, Vec<ValidationError>> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.errors),
        }
    }
}

impl<T: Serialize> ValidationResult<T> {
    /// Convert to JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": self.success,
            "data": self.data,
            "errors": self.errors.iter().map(ValidationError::to_json).collect::<Vec<_>>(),
        })
    }
}

impl<T> From<Result<T, Vec<ValidationError>>> for ValidationResult<T> {
    fn from(result: Result<T, Vec<ValidationError>>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(errors) => Self::failures(errors),
        }
    }
}
