//! Relay wire protocol.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     ProxiedRequest (method, headers, credentials, referrer)
//!     → encode.rs (mandatory `--` fields, allow-list, `--ext` JSON,
//!                  in-band origin/referer/cookie)
//!     → HeaderList sent to the relay host
//!
//! Inbound:
//!     relay response headers
//!     → decode.rs (`--s` status override, duplicate-slot demux,
//!                  `--` unescape, set-cookie extraction, vary cleanup)
//!     → RelayResponseInfo { status, headers, cookie_strs }
//! ```
//!
//! Everything the relay needs to know travels in HTTP header fields. Names
//! starting with `--` belong to the protocol; an origin field whose name
//! collides with one the transport refuses to carry travels escaped as
//! `--name`.

pub mod decode;
pub mod encode;
pub mod headers;

pub use decode::{decode_response_headers, RelayResponseInfo};
pub use encode::{encode_request_headers, EncodeContext};
pub use headers::HeaderList;

/// Protocol field names.
pub mod fields {
    pub const VER: &str = "--ver";
    pub const URL: &str = "--url";
    pub const MODE: &str = "--mode";
    pub const TYPE: &str = "--type";
    pub const LEVEL: &str = "--level";
    pub const ORIGIN: &str = "--origin";
    pub const REFERER: &str = "--referer";
    pub const COOKIE: &str = "--cookie";
    pub const EXT: &str = "--ext";
    pub const ACEH: &str = "--aceh";
    pub const RAW_INFO: &str = "--raw-info";

    /// Response: true origin status.
    pub const STATUS: &str = "--s";
    /// Response: capability-probe marker.
    pub const PROBE: &str = "--t";
    /// Response: relay could not serve the request.
    pub const ERROR: &str = "--error";
    /// Response: relay re-routed internally, retry one level up.
    pub const SWITCHED: &str = "--switched";

    /// Internal cache key the relay may list in `vary`.
    pub const VARY_KEY: &str = "--url";
}

/// Prefix marking a protocol field or an escaped origin field.
pub const ESCAPE_PREFIX: &str = "--";

/// Request headers copied verbatim to the relay. Everything else is
/// folded into the `--ext` JSON object.
pub const REQ_HDR_ALLOW: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "accept-datetime",
    "authorization",
    "cache-control",
    "content-length",
    "content-type",
    "date",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-range",
    "if-unmodified-since",
    "max-forwards",
    "pragma",
    "range",
    "te",
    "upgrade",
    "upgrade-insecure-requests",
    "origin",
    "user-agent",
    "x-requested-with",
    "chrome-proxy",
];

/// Escape a field name so it travels as protocol-safe `--name`.
pub fn escape_name(name: &str) -> String {
    format!("{ESCAPE_PREFIX}{}", name.to_ascii_lowercase())
}

/// Whether a lower-cased request header is copied to the relay as-is.
pub fn is_allowed_request_header(name: &str) -> bool {
    REQ_HDR_ALLOW.contains(&name)
}
