//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use reqwest::{redirect, Client};

use crate::error::TransportError;
use crate::protocol::HeaderList;
use crate::transport::{data, OutboundRequest, ResponseBody, Transport, UpstreamResponse};
use crate::urlx::is_http_proto;

/// HTTP client shared by relay calls and fast-path probes.
///
/// Redirects are returned to the caller, never followed, and no `Referer`
/// is added: referrer semantics travel in-band as `--referer`. `data:` URLs
/// are answered locally; other non-HTTP schemes are rejected.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .referer(false);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", request.url, e)))?;
        if url.scheme() == "data" {
            return data::fetch(&url);
        }
        if !is_http_proto(url.scheme()) {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers.to_header_map());
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = HeaderList::from_header_map(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body: ResponseBody::Stream(body),
        })
    }
}
