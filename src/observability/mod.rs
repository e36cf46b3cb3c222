//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (human or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
