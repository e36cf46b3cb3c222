//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (retry bound, node weights)
//! - Check the front origin and prefix can build proxy URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use url::Url;

use crate::config::schema::RelayConfig;

/// Largest accepted node weight; the pool builds one slot per unit.
pub const MAX_NODE_WEIGHT: u32 = 1000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.relay.nodes.is_empty() {
        errors.push(ValidationError::new("relay.nodes", "at least one relay node is required"));
    }
    for (i, node) in config.relay.nodes.iter().enumerate() {
        if node.weight == 0 {
            errors.push(ValidationError::new(
                format!("relay.nodes[{i}].weight"),
                format!("node '{}' must have a non-zero weight", node.name),
            ));
        } else if node.weight > MAX_NODE_WEIGHT {
            errors.push(ValidationError::new(
                format!("relay.nodes[{i}].weight"),
                format!("node '{}' weight exceeds {MAX_NODE_WEIGHT}", node.name),
            ));
        }
        if node.host.is_empty() {
            errors.push(ValidationError::new(
                format!("relay.nodes[{i}].host"),
                format!("node '{}' has an empty host", node.name),
            ));
        }
    }
    if !matches!(config.relay.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "relay.scheme",
            format!("unsupported scheme '{}'", config.relay.scheme),
        ));
    }

    if config.protocol.max_retry == 0 {
        errors.push(ValidationError::new("protocol.max_retry", "must be at least 1"));
    }

    match Url::parse(&config.front.public_origin) {
        Ok(url) if url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new("front.public_origin", "origin has no host")),
        Err(e) => errors.push(ValidationError::new("front.public_origin", e.to_string())),
    }
    if !config.front.prefix.starts_with('/') {
        errors.push(ValidationError::new("front.prefix", "must start with '/'"));
    }

    if config.cache.path.is_some() && config.cache.flush_interval_secs == 0 {
        errors.push(ValidationError::new("cache.flush_interval_secs", "must be at least 1"));
    }

    if let Some(cdn) = &config.fast_path.cdn {
        if let Err(e) = Url::parse(&cdn.base_url) {
            errors.push(ValidationError::new("fast_path.cdn.base_url", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
