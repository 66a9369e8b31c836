// Validation errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of the path to the value being validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array index
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Validation error for a single value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable error code (e.g. `async.timeout`)
    pub code: String,

    /// Error message
    pub message: String,

    /// Path to the offending value
    pub path: Vec<PathSegment>,

    /// Last segment of `path`, or empty
    pub field: String,
}

impl ValidationError {
    /// Create a new validation error with an empty path
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: Vec::new(),
            field: String::new(),
        }
    }

    /// Set the path; `field` follows the last segment.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self.sync_field();
        self
    }

    /// Append a segment to the path
    pub fn push_path(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.push(segment.into());
        self.sync_field();
        self
    }

    fn sync_field(&mut self) {
        self.field = self
            .path
            .last()
            .map(ToString::to_string)
            .unwrap_or_default();
    }

    /// Convert to JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "path": self.path,
            "field": self.field,
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_follows_last_segment() {
        let error = ValidationError::new("string.min", "too short").with_path(["user", "name"]);
        assert_eq!(error.field, "name");

        let error = error.push_path(2usize);
        assert_eq!(error.field, "2");
        assert_eq!(error.path.len(), 3);
    }

    #[test]
    fn test_empty_path_has_empty_field() {
        let error = ValidationError::new("async.error", "boom");
        assert!(error.path.is_empty());
        assert_eq!(error.field, "");
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn test_path_serializes_untagged() {
        let error = ValidationError::new("c", "m")
            .with_path([PathSegment::from("items"), PathSegment::from(0usize)]);
        let json = error.to_json();
        assert_eq!(json["path"], serde_json::json!(["items", 0]));
        assert_eq!(json["field"], "0");
    }
}
