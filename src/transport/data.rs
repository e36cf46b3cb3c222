//! `data:` URLs, answered in-process.

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use url::{Position, Url};

use crate::error::TransportError;
use crate::protocol::HeaderList;
use crate::transport::UpstreamResponse;

const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

/// Decode `url` into a 200 response carrying its media type and payload.
pub fn fetch(url: &Url) -> Result<UpstreamResponse, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidRequest(format!("{reason}: data URL"));

    // Fragment is not part of the payload.
    let content = &url[Position::BeforePath..Position::AfterQuery];
    let (meta, payload) = content.split_once(',').ok_or_else(|| invalid("missing ','"))?;

    let (media_type, is_base64) = match meta.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (meta, false),
    };
    let media_type = match media_type.trim() {
        "" => DEFAULT_MEDIA_TYPE.to_string(),
        m if m.starts_with(';') => format!("text/plain{m}"),
        m => String::from_utf8_lossy(&percent_decode(m)).into_owned(),
    };

    let raw = percent_decode(payload);
    let body = if is_base64 {
        let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        general_purpose::STANDARD
            .decode(compact)
            .map_err(|_| invalid("bad base64 payload"))?
    } else {
        raw
    };

    let mut headers = HeaderList::new();
    headers.append("content-type", media_type);
    headers.append("content-length", body.len().to_string());
    Ok(UpstreamResponse::new(200, headers, Bytes::from(body)))
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
