//! Client-side relay engine for a header-encoded web proxy.
//!
//! Requests are re-encoded into a `--`-prefixed header protocol, sent to
//! one of several relay hosts, and decoded back into the origin response.
//! The engine owns failover across relays, a per-URL host-affinity cache,
//! cross-origin cookie scoping, and fast paths that skip relaying.

pub mod affinity;
pub mod config;
pub mod cookies;
pub mod dispatch;
pub mod error;
pub mod fastpath;
pub mod http;
pub mod load_balancer;
pub mod observability;
pub mod protocol;
pub mod tld;
pub mod transport;
pub mod urlx;

pub use config::RelayConfig;
pub use dispatch::{Launched, ProxiedRequest, Relay};
pub use http::FrontServer;
