//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON lines for production, human format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "relay_proxy={level},relay_cli={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
