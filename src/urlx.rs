//! URL helpers: fragment stripping, routing hash and proxy-relative URLs.

use url::Url;

/// Serialize `url` without its fragment.
pub fn del_hash(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Whether a URL scheme (without the trailing `:`) is relayable.
pub fn is_http_proto(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// 32-bit rolling hash over UTF-16 code units, shared with the relay's
/// routing tables and the CDN manifest.
pub fn url_hash(url: &str) -> u32 {
    url.encode_utf16()
        .fold(0u32, |sum, unit| sum.wrapping_mul(31).wrapping_add(unit as u32))
}

/// Maps between absolute target URLs and URLs on the local front.
///
/// A target `https://example.com/a` is reachable at
/// `{public_origin}{prefix}https://example.com/a`.
#[derive(Debug, Clone)]
pub struct UrlCodec {
    origin: String,
    prefix: String,
}

impl UrlCodec {
    pub fn new(public_origin: &str, prefix: &str) -> Result<Self, url::ParseError> {
        let origin = Url::parse(public_origin)?.origin().ascii_serialization();
        Ok(Self {
            origin,
            prefix: prefix.to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The referrer a caller sends under `referrer-policy: origin`.
    pub fn site_root_referrer(&self) -> String {
        format!("{}/", self.origin)
    }

    /// Absolute front URL for a target.
    pub fn encode(&self, target: &str) -> String {
        format!("{}{}{}", self.origin, self.prefix, target)
    }

    /// Recover the target from a front URL; other strings pass through.
    pub fn decode_abs<'a>(&self, s: &'a str) -> &'a str {
        s.strip_prefix(self.origin.as_str())
            .unwrap_or(s)
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(s)
    }

    /// Target embedded in a front path (`{prefix}https://...`), if any.
    pub fn target_from_path<'a>(&self, path_and_query: &'a str) -> Option<&'a str> {
        path_and_query.strip_prefix(self.prefix.as_str())
    }

    /// Rewrite the URL inside a `refresh` value (`5; url=/next`) so it is
    /// resolved against `base` and routed through the front.
    pub fn replace_http_refresh(&self, value: &str, base: &Url) -> String {
        let lower = value.to_ascii_lowercase();
        let Some(semi) = lower.find(';') else {
            return value.to_string();
        };
        let after = &lower[semi + 1..];
        let skipped = after.len() - after.trim_start().len();
        let key_at = semi + 1 + skipped;
        if !lower[key_at..].starts_with("url=") {
            return value.to_string();
        }
        let url_at = key_at + "url=".len();
        let raw = value[url_at..].trim().trim_matches(|c| c == '\'' || c == '"');
        if raw.is_empty() {
            return value.to_string();
        }
        match base.join(raw) {
            Ok(resolved) => format!("{}{}", &value[..url_at], self.encode(resolved.as_str())),
            Err(e) => {
                tracing::debug!(value = %value, error = %e, "Leaving unparsable refresh URL as-is");
                value.to_string()
            }
        }
    }
}
