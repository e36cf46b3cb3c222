//! Fast paths that serve a resource without relaying.
//!
//! # Data Flow
//! ```text
//! GET with no usable affinity record
//!     → direct.rs (host known to allow CORS → fetch, accept 200/206)
//!     → cdn.rs    (url hash in manifest → fetch accelerated copy)
//!     → hit: caller records a host-less affinity entry and returns
//!     → miss: fall through to relay dispatch
//! ```
//!
//! # Design Decisions
//! - Failures are logged and absorbed, never retried
//! - The direct-host set is swappable at runtime without locks

pub mod cdn;
pub mod direct;

pub use cdn::{CdnProbe, ManifestCdn, NoCdn};
pub use direct::{DirectHosts, DirectProbe};
