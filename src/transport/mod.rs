//! Outbound HTTP.
//!
//! # Data Flow
//! ```text
//! dispatch / fastpath
//!     → OutboundRequest { url, method, headers, body }
//!     → Transport::send (http.rs: reqwest, no redirects, no referrer)
//!     → UpstreamResponse { status, headers, body stream }
//! ```
//!
//! # Design Decisions
//! - One trait seam for every network call so the failover logic can run
//!   against scripted relays
//! - Cancellation races the call and then the body stream; a cancelled
//!   call is a transport failure

pub mod data;
pub mod http;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::protocol::HeaderList;

pub use self::http::HttpTransport;

/// A request leaving this process.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// Header-less GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderList::new(),
            body: None,
        }
    }
}

/// Response body, buffered or streamed.
pub enum ResponseBody {
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes, TransportError>>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self::Full(Bytes::new())
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self {
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A response as received, before any relay decoding.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: ResponseBody,
}

impl UpstreamResponse {
    pub fn new(status: u16, headers: HeaderList, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Full(body.into()),
        }
    }
}

/// Performs network calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Send `request`, giving up if `cancel` fires first.
///
/// A streamed body keyed to the same token stops at the next chunk after
/// cancellation and ends with `TransportError::Cancelled`.
pub async fn send_cancellable(
    transport: &dyn Transport,
    request: OutboundRequest,
    cancel: Option<&CancellationToken>,
) -> Result<UpstreamResponse, TransportError> {
    match cancel {
        Some(token) => {
            let mut response = tokio::select! {
                _ = token.cancelled() => return Err(TransportError::Cancelled),
                result = transport.send(request) => result?,
            };
            response.body = cancellable_body(response.body, token.clone());
            Ok(response)
        }
        None => transport.send(request).await,
    }
}

fn cancellable_body(body: ResponseBody, token: CancellationToken) -> ResponseBody {
    match body {
        ResponseBody::Full(bytes) => ResponseBody::Full(bytes),
        ResponseBody::Stream(chunks) => {
            let observer = token.clone();
            let tail = stream::once(async move {
                observer.is_cancelled().then_some(Err(TransportError::Cancelled))
            })
            .filter_map(|item| async move { item });
            ResponseBody::Stream(chunks.take_until(token.cancelled_owned()).chain(tail).boxed())
        }
    }
}
