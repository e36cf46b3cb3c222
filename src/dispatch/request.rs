//! The request handed to `launch`.

use axum::http::Method;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::cookies::CredentialsMode;
use crate::protocol::HeaderList;

/// An intercepted request, as the caller issued it.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    pub headers: HeaderList,
    /// Forwarded for every method except GET and HEAD.
    pub body: Option<Bytes>,
    pub credentials: CredentialsMode,
    /// Fetch mode (`cors`, `navigate`, `no-cors`, ...).
    pub mode: String,
    /// Referrer as the caller saw it (proxy-relative).
    pub referrer: Option<String>,
    /// Fetch destination; empty when unknown.
    pub destination: String,
    /// Cancels in-flight network calls for this request.
    pub cancel: Option<CancellationToken>,
}

impl ProxiedRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderList::new(),
            body: None,
            credentials: CredentialsMode::default(),
            mode: "cors".to_string(),
            referrer: None,
            destination: String::new(),
            cancel: None,
        }
    }

    /// Bare `cors` GET with default credentials.
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Body to forward, if the method carries one.
    pub fn forwarded_body(&self) -> Option<Bytes> {
        if self.method == Method::GET || self.method == Method::HEAD {
            return None;
        }
        self.body.clone().filter(|b| !b.is_empty())
    }
}
