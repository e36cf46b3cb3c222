//! Relay host selection.
//!
//! # Data Flow
//! ```text
//! launch attempt with no host selected
//!     → select_host(url hash, level)
//!         - level 0/1: weighted slot for the hash
//!         - level k>1: k-1 nodes past that slot
//!     → build_url(host) → relay endpoint for the attempt
//! ```
//!
//! # Design Decisions
//! - Selection is a pure function of (hash, level); no health tracking
//! - The same URL maps to the same node so relay-side caches stay warm

pub mod pool;

pub use pool::RelayPool;

/// Chooses relay hosts for dispatch attempts.
pub trait HostSelector: Send + Sync + std::fmt::Debug {
    /// Host to try for a URL hash at an escalation level, or `None` when
    /// no host is available.
    fn select_host(&self, url_hash: u32, level: u32) -> Option<String>;

    /// Relay endpoint URL on `host`.
    fn build_url(&self, host: &str, endpoint: &str) -> String;
}
