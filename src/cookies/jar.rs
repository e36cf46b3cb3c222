//! Cookie storage on behalf of the caller.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use url::Url;

/// A cookie bound to the URL whose response set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieItem {
    pub name: String,
    pub value: String,
    /// Lower-cased domain without a leading dot.
    pub domain: String,
    pub path: String,
    /// Unix seconds; `None` for session cookies.
    pub expires: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    /// Only sent to `domain` itself, not its subdomains.
    pub host_only: bool,
    pub same_site: Option<String>,
}

impl CookieItem {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn domain_matches(&self, host: &str) -> bool {
        if self.host_only {
            return host == self.domain;
        }
        host == self.domain
            || (host.len() > self.domain.len()
                && host.ends_with(&self.domain)
                && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.')
    }

    fn path_matches(&self, path: &str) -> bool {
        path == self.path
            || (path.starts_with(&self.path)
                && (self.path.ends_with('/') || path.as_bytes().get(self.path.len()) == Some(&b'/')))
    }
}

/// Cookie jar collaborator.
pub trait CookieJar: Send + Sync {
    /// Build the `Cookie` header value for a request to `url`.
    fn concat(&self, url: &Url) -> String;

    /// Parse a `Set-Cookie` string received from `url`.
    fn parse(&self, raw: &str, url: &Url) -> Option<CookieItem>;

    /// Store a cookie, replacing one with the same name, domain and path.
    fn set(&self, item: CookieItem);
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn parse_expires(value: &str) -> Option<i64> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        // Netscape-style `Wed, 21-Oct-2015 07:28:00 GMT`
        .or_else(|_| DateTime::parse_from_rfc2822(&value.replace('-', " ")))
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

/// In-memory jar keyed by cookie domain.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    domains: DashMap<String, Vec<CookieItem>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies, expired ones included.
    pub fn len(&self) -> usize {
        self.domains.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieJar for MemoryCookieJar {
    fn concat(&self, url: &Url) -> String {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return String::new();
        };
        let path = url.path();
        let secure = url.scheme() == "https";
        let now = Utc::now().timestamp();

        let mut pairs = Vec::new();
        let mut candidate = host.as_str();
        loop {
            if let Some(items) = self.domains.get(candidate) {
                for item in items.iter() {
                    if item.is_expired_at(now)
                        || (item.secure && !secure)
                        || !item.domain_matches(&host)
                        || !item.path_matches(path)
                    {
                        continue;
                    }
                    pairs.push(format!("{}={}", item.name, item.value));
                }
            }
            match candidate.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => candidate = parent,
                _ => break,
            }
        }
        pairs.join("; ")
    }

    fn parse(&self, raw: &str, url: &Url) -> Option<CookieItem> {
        let host = url.host_str()?.to_ascii_lowercase();
        let mut parts = raw.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut item = CookieItem {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain: host.clone(),
            path: default_path(url),
            expires: None,
            secure: false,
            http_only: false,
            host_only: true,
            same_site: None,
        };
        let mut max_age = None;

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if domain.is_empty() {
                        continue;
                    }
                    item.domain = domain;
                    item.host_only = false;
                    if !item.domain_matches(&host) {
                        tracing::debug!(cookie = %name, domain = %item.domain, host = %host, "Rejecting cookie for foreign domain");
                        return None;
                    }
                }
                "path" if val.starts_with('/') => item.path = val.to_string(),
                "expires" => {
                    if let Some(at) = parse_expires(val) {
                        item.expires = Some(at);
                    }
                }
                "max-age" => max_age = val.parse::<i64>().ok(),
                "secure" => item.secure = true,
                "httponly" => item.http_only = true,
                "samesite" => item.same_site = Some(val.to_ascii_lowercase()),
                _ => {}
            }
        }

        if let Some(secs) = max_age {
            item.expires = Some(Utc::now().timestamp().saturating_add(secs));
        }
        Some(item)
    }

    fn set(&self, item: CookieItem) {
        let now = Utc::now().timestamp();
        let mut items = self.domains.entry(item.domain.clone()).or_default();
        items.retain(|c| !(c.name == item.name && c.path == item.path) && !c.is_expired_at(now));
        if !item.is_expired_at(now) {
            items.push(item);
        }
    }
}
