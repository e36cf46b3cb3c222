//! Request direction: ProxiedRequest → relay header set.

use serde_json::{Map, Value};
use url::Url;

use crate::cookies::CookiePolicy;
use crate::dispatch::ProxiedRequest;
use crate::protocol::{fields, is_allowed_request_header, HeaderList};
use crate::urlx::{del_hash, UrlCodec};

/// Inputs to header encoding that outlive a single request.
pub struct EncodeContext<'a> {
    /// Value placed in `--ver`.
    pub version: &'a str,
    /// Ask the relay for per-field renaming instead of a wildcard
    /// `access-control-expose-headers`.
    pub aceh_compat: bool,
    pub urls: &'a UrlCodec,
    pub cookies: &'a CookiePolicy,
}

/// Encode a request into the header set sent to a relay host.
///
/// `--level` is seeded with `1`; the dispatcher overwrites it before each
/// attempt.
pub fn encode_request_headers(
    req: &ProxiedRequest,
    target: &Url,
    client: &Url,
    ctx: &EncodeContext<'_>,
) -> HeaderList {
    let mut sys = HeaderList::new();
    sys.set(fields::VER, ctx.version);
    sys.set(fields::URL, del_hash(target));
    sys.set(fields::MODE, req.mode.as_str());
    sys.set(fields::TYPE, req.destination.as_str());
    sys.set(fields::LEVEL, "1");

    let mut ext = Map::new();
    for (name, value) in req.headers.iter() {
        if is_allowed_request_header(name) {
            sys.append(name, value);
            continue;
        }
        match ext.get_mut(name) {
            Some(Value::String(prev)) => {
                prev.push_str(", ");
                prev.push_str(value);
            }
            _ => {
                ext.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
    }

    let client_origin = client.origin().ascii_serialization();
    if sys.has("origin") {
        sys.set(fields::ORIGIN, client_origin.as_str());
    } else {
        sys.set(fields::ORIGIN, "");
    }

    if let Some(referrer) = req.referrer.as_deref().filter(|r| !r.is_empty()) {
        if referrer == ctx.urls.site_root_referrer() {
            // referrer-policy: origin
            sys.set(fields::REFERER, format!("{client_origin}/"));
        } else {
            sys.set(fields::REFERER, ctx.urls.decode_abs(referrer));
        }
    }

    let cookie = ctx.cookies.send_cookies(target, client, req.credentials);
    sys.set(fields::COOKIE, cookie);

    if !ext.is_empty() {
        sys.set(fields::EXT, Value::Object(ext).to_string());
    }
    if ctx.aceh_compat {
        sys.set(fields::ACEH, "1");
    }
    sys
}
