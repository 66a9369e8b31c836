// Validation traits and context

use crate::{PathSegment, ValidationResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for async validators a schema engine can drive
/// (e.g. uniqueness checks against a remote service).
#[async_trait]
pub trait AsyncValidate<T: Send + 'static>: Send + Sync {
    /// Validate `value` in `context`
    async fn validate_async(&self, value: T, context: ValidationContext) -> ValidationResult<T>;
}

/// Validation context supplied by the surrounding schema engine.
///
/// Async validators pass it through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationContext {
    /// Path to the value being validated
    pub path: Vec<PathSegment>,
    /// Field name (last path segment)
    pub field: String,
    /// Locale for messages
    pub locale: Option<String>,
    /// Request data or additional context
    pub data: HashMap<String, serde_json::Value>,
}

impl ValidationContext {
    /// Create a new validation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context positioned at `path`
    pub fn at_path<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let path: Vec<PathSegment> = path.into_iter().map(Into::into).collect();
        let field = path.last().map(ToString::to_string).unwrap_or_default();
        Self {
            path,
            field,
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Add context data
    pub fn with_data(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Get context data
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
