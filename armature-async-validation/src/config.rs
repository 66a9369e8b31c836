// Validator configuration loading

use crate::error::ConfigError;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Declarative description of a validator's strategy chain.
///
/// ```toml
/// name = "username"
///
/// [[strategies]]
/// strategy = "debounce"
/// duration_ms = 300
///
/// [[strategies]]
/// strategy = "retry"
/// max_attempts = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Name attached to log events.
    #[serde(default)]
    pub name: Option<String>,
    /// Strategies, innermost first.
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl ValidatorConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))
    }

    /// Parse `content` in the given format.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        match format {
            FileFormat::Json => Self::from_json(content),
            FileFormat::Toml => Self::from_toml(content),
        }
    }

    /// Load from a file, detecting the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;
        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content, format)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject policies that cannot be honoured as written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            if let Strategy::Retry(policy) = strategy {
                policy.validate().map_err(|e| {
                    ConfigError::ValidationError(format!("strategies[{}]: {}", index, e))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{DebounceConfig, RetryPolicy, TimeoutConfig};
    use std::time::Duration;

    #[test]
    fn test_parse_json() {
        let config = ValidatorConfig::from_json(
            r#"{
                "name": "email",
                "strategies": [
                    {"strategy": "timeout", "duration_ms": 2000, "message": "too slow"},
                    {"strategy": "retry", "max_attempts": 2, "initial_delay_ms": 50}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("email"));
        assert_eq!(
            config.strategies[0],
            Strategy::Timeout(TimeoutConfig::new(Duration::from_secs(2)).message("too slow"))
        );
        let Strategy::Retry(policy) = &config.strategies[1] else {
            panic!("expected retry, got {:?}", config.strategies[1]);
        };
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, RetryPolicy::default().max_delay);
    }

    #[test]
    fn test_parse_toml() {
        let config = ValidatorConfig::from_toml(
            r#"
                name = "username"

                [[strategies]]
                strategy = "debounce"
                duration_ms = 300
            "#,
        )
        .unwrap();

        assert_eq!(
            config.strategies,
            vec![Strategy::Debounce(DebounceConfig::new(Duration::from_millis(300)))]
        );
    }

    #[test]
    fn test_empty_config() {
        let config = ValidatorConfig::from_json("{}").unwrap();
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = ValidatorConfig::from_json(r#"{"strategies": [{"strategy": "throttle"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = ValidatorConfig {
            name: None,
            strategies: vec![Strategy::Retry(RetryPolicy::new(0))],
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError(ref msg) if msg.contains("strategies[0]")
        ));
    }

    #[test]
    fn test_load_detects_format() {
        let dir = std::env::temp_dir()
            .join(format!("armature-forms-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("validator.toml");
        fs::write(&path, "[[strategies]]\nstrategy = \"retry\"\nmax_attempts = 4\n").unwrap();

        let config = ValidatorConfig::load(&path).unwrap();
        assert_eq!(config.strategies, vec![Strategy::Retry(RetryPolicy::new(4))]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_unsupported_extension() {
        let err = ValidatorConfig::load("validator.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));

        let err = ValidatorConfig::load("validator").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("toml"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("env"), None);
    }
}
