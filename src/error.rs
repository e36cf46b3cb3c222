//! Error types shared across subsystems.
//!
//! Nothing here escapes `Relay::launch`: the dispatcher logs these and
//! degrades to a cache miss, a fast-path fallthrough, or an absent result.

use thiserror::Error;

/// Errors raised by the affinity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not valid JSON.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while talking to relay hosts, direct origins or the CDN.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL cannot be fetched by this transport (e.g. `chrome-extension:`).
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The outbound request could not be assembled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, TLS or protocol failure before a response arrived.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors raised while assembling a relay engine from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// `front.public_origin` is not a URL.
    #[error("invalid public origin: {0}")]
    InvalidOrigin(#[from] url::ParseError),

    /// The outbound HTTP client could not be built.
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by the local front server.
#[derive(Debug, Error)]
pub enum FrontError {
    /// The path does not carry an absolute target URL.
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    /// Reading the request body failed.
    #[error("failed to read request body: {0}")]
    Body(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
