//! Cookie subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     credentials mode + registrable domains (tld)
//!     → policy.rs send_cookies
//!     → jar.rs concat → `--cookie`
//!
//! Inbound:
//!     set-cookie strings from the decoded relay response
//!     → policy.rs filter_received_cookies (third-party gate)
//!     → jar.rs parse → httpOnly removed → returned to the caller
//! ```
//!
//! # Design Decisions
//! - httpOnly cookies never cross back to the caller
//! - The jar is a collaborator behind a trait; the policy owns no storage

pub mod jar;
pub mod policy;

pub use jar::{CookieItem, CookieJar, MemoryCookieJar};
pub use policy::{CookiePolicy, CredentialsMode};
