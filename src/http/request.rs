//! Request handling: front request → `ProxiedRequest`.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Recover the target and client URLs from the front path and referrer
//! - Strip hop-by-hop and front-internal headers
//! - Read the body within the configured limit

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::cookies::CredentialsMode;
use crate::dispatch::ProxiedRequest;
use crate::error::FrontError;
use crate::protocol::HeaderList;
use crate::urlx::UrlCodec;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Headers that never leave the front.
///
/// Cookies come from the engine's jar and the referrer travels in-band, so
/// the browser's own copies are dropped with the connection-level ones.
const DROPPED_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "transfer-encoding",
    "trailer",
    "host",
    "content-length",
    "cookie",
    "referer",
    "sec-fetch-mode",
    "sec-fetch-dest",
    "sec-fetch-site",
    "sec-fetch-user",
    X_REQUEST_ID,
];

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// A front request resolved into engine inputs.
#[derive(Debug)]
pub struct FrontRequest {
    pub request: ProxiedRequest,
    pub target: Url,
    pub client: Url,
}

/// Absolute target URL carried in a front path.
pub fn parse_target(urls: &UrlCodec, path_and_query: &str) -> Result<Url, FrontError> {
    let raw = urls
        .target_from_path(path_and_query)
        .ok_or_else(|| FrontError::InvalidTarget(path_and_query.to_string()))?;
    Url::parse(raw).map_err(|_| FrontError::InvalidTarget(path_and_query.to_string()))
}

/// URL of the page that issued the request: the target behind a proxied
/// referrer, or the target itself.
pub fn client_url(urls: &UrlCodec, referrer: Option<&str>, target: &Url) -> Url {
    referrer
        .map(|r| urls.decode_abs(r))
        .filter(|decoded| Some(*decoded) != referrer)
        .and_then(|decoded| Url::parse(decoded).ok())
        .unwrap_or_else(|| target.clone())
}

/// Browser headers that are forwarded to the engine.
pub fn forwarded_headers(map: &HeaderMap) -> HeaderList {
    let mut headers = HeaderList::from_header_map(map);
    for name in DROPPED_REQUEST_HEADERS {
        headers.remove(name);
    }
    headers
}

fn header_str<'a>(map: &'a HeaderMap, name: &str) -> Option<&'a str> {
    map.get(name).and_then(|v| v.to_str().ok())
}

/// Convert a front request, reading at most `body_limit` body bytes.
pub async fn into_front_request(
    urls: &UrlCodec,
    request: Request<Body>,
    body_limit: usize,
) -> Result<FrontRequest, FrontError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = parse_target(urls, path_and_query)?;

    let referrer = header_str(&parts.headers, "referer").map(str::to_string);
    let client = client_url(urls, referrer.as_deref(), &target);

    let mode = header_str(&parts.headers, "sec-fetch-mode")
        .unwrap_or("cors")
        .to_string();
    let destination = match header_str(&parts.headers, "sec-fetch-dest") {
        Some("empty") | None => String::new(),
        Some(dest) => dest.to_string(),
    };

    let body = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|e| FrontError::Body(e.to_string()))?;

    let mut request = ProxiedRequest::new(parts.method);
    request.headers = forwarded_headers(&parts.headers);
    request.body = (!body.is_empty()).then_some(body);
    request.credentials = CredentialsMode::Include;
    request.mode = mode;
    request.referrer = referrer;
    request.destination = destination;

    Ok(FrontRequest {
        request,
        target,
        client,
    })
}
