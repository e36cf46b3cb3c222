//! Local front server subsystem.
//!
//! # Data Flow
//! ```text
//! browser request  GET {prefix}https://example.com/a
//!     → server.rs (Axum fallback, request ID, trace)
//!     → request.rs (target, client URL, mode, destination, headers, body)
//!     → Relay::launch
//!     → response.rs (origin status/headers, cookies into the jar, stream)
//!     → browser
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{FrontRequest, RequestUuid, X_REQUEST_ID};
pub use server::{FrontServer, FrontState};
