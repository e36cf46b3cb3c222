//! Response handling: `Launched` → browser response.
//!
//! # Responsibilities
//! - Use the origin status and headers for relayed responses
//! - Store exposed cookies in the engine's jar
//! - Stream bodies without buffering
//! - Map a failed launch to 502 Bad Gateway

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::cookies::CookiePolicy;
use crate::dispatch::Launched;
use crate::protocol::HeaderList;
use crate::transport::ResponseBody;

/// Connection-level headers not copied to the browser.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "trailer",
    "upgrade",
];

fn body(body: ResponseBody) -> Body {
    match body {
        ResponseBody::Full(bytes) => Body::from(bytes),
        ResponseBody::Stream(stream) => Body::from_stream(stream),
    }
}

fn build(status: u16, mut headers: HeaderList, payload: ResponseBody) -> Response {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(body(payload));
    *response.status_mut() = status;
    *response.headers_mut() = headers.to_header_map();
    response
}

/// Turn a launch result into the response sent to the browser.
pub fn into_front_response(launched: Launched, cookies: &CookiePolicy) -> Response {
    let Launched { response, relayed } = launched;
    match relayed {
        Some(parts) => {
            for item in parts.cookies.into_iter().flatten() {
                tracing::debug!(name = %item.name, domain = %item.domain, "Storing cookie");
                cookies.jar().set(item);
            }
            build(parts.status, parts.headers, response.body)
        }
        None => build(response.status, response.headers, response.body),
    }
}

/// Response for a launch that produced nothing.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Relay request failed").into_response()
}
