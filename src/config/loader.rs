//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let config = parse_config(
            r#"
            [[relay.nodes]]
            name = "a"
            host = "a.test"
            "#,
        )
        .unwrap();
        assert_eq!(config.relay.nodes[0].host, "a.test");
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = parse_config("[protocol]\nmax_retry = 0\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed: "));
        assert!(msg.contains("relay.nodes"));
        assert!(msg.contains("protocol.max_retry"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("[protocol"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
