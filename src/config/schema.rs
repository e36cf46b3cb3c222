//! Configuration schema definitions.
//!
//! Every section defaults, so a file carrying only `[[relay.nodes]]` is a
//! usable configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay engine and its front server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay protocol settings.
    pub protocol: ProtocolConfig,

    /// Local front server the browser talks to.
    pub front: FrontConfig,

    /// Relay hosts and how to reach them.
    pub relay: RelayPoolConfig,

    /// Direct and CDN fast paths.
    pub fast_path: FastPathConfig,

    /// Host-affinity store.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Relay protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Value sent as `--ver`.
    pub version: String,

    /// Upper bound on relay attempts per launch.
    pub max_retry: u32,

    /// Lifetime of an affinity record in seconds.
    pub cache_ttl_secs: u64,

    /// Whether cross-site cookies are sent and accepted.
    pub third_party_cookies: bool,

    /// Initial value of the `--aceh` capability probe.
    pub probe_aceh: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: "110".to_string(),
            max_retry: 5,
            cache_ttl_secs: 60 * 60 * 24 * 7,
            third_party_cookies: true,
            probe_aceh: true,
        }
    }
}

/// Front server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Origin the browser sees for proxied pages.
    pub public_origin: String,

    /// Path prefix in front of every proxied absolute URL.
    pub prefix: String,

    /// Largest request body accepted from the browser.
    pub max_body_bytes: usize,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            public_origin: "http://127.0.0.1:8080".to_string(),
            prefix: "/-----".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Relay host pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayPoolConfig {
    /// Relay nodes.
    pub nodes: Vec<RelayNodeConfig>,

    /// Scheme used to reach relay nodes.
    pub scheme: String,

    /// Per-request timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for RelayPoolConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            scheme: "https".to_string(),
            timeout_secs: 30,
        }
    }
}

/// A single relay node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayNodeConfig {
    /// Node identifier for logging.
    pub name: String,

    /// Host (and optional port) of the relay.
    pub host: String,

    /// Share of the slot table (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Fast paths that bypass relaying.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FastPathConfig {
    /// `host[:port]` entries known to serve permissive CORS.
    pub direct_hosts: Vec<String>,

    /// Optional CDN for common static assets.
    pub cdn: Option<CdnConfig>,
}

/// CDN manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdnConfig {
    /// Base URL; resources live at `{base_url}/{version}/{hash}`.
    pub base_url: String,

    /// URL hash (decimal string) → version.
    #[serde(default)]
    pub manifest: HashMap<String, u32>,
}

/// Affinity store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file backing the store; in-memory when unset.
    pub path: Option<String>,

    /// Seconds between flushes of the file store.
    pub flush_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
