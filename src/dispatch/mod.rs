//! Relay dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! launch(ProxiedRequest, target, client)
//!     → non-http scheme      → fetch as-is
//!     → GET: affinity lookup → hit: cached host at level 0
//!                            → miss: direct probe, then CDN probe
//!                                    → hit: host-less affinity record, return
//!     → encode relay headers (protocol::encode)
//!     → loop ≤ max_retry:
//!         select host (load_balancer) unless one is held
//!         set --level / --raw-info, send (transport)
//!         classify: --error | --switched | resolved (state.rs)
//!     → record affinity, decode headers, filter cookies
//! ```
//!
//! # Design Decisions
//! - Every failure collapses to `None`; causes are logged
//! - Transport failures end the chain immediately, relay signals retry
//! - Loop state lives in `DispatchState` so transitions test in isolation

pub mod flags;
pub mod relay;
pub mod request;
pub mod state;

pub use flags::AcehProbe;
pub use relay::{Launched, Relay, RelayComponents, RelaySettings, RelayedParts, RELAY_ENDPOINT};
pub use request::ProxiedRequest;
pub use state::{DispatchState, RelaySignal, Step};
