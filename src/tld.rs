//! Registrable-domain resolution for first-party / third-party decisions.

use std::collections::HashSet;
use std::net::IpAddr;

/// Maps a hostname to its registrable domain (public suffix + one label).
pub trait DomainResolver: Send + Sync {
    fn registrable_domain(&self, host: &str) -> String;
}

/// Multi-label public suffixes known to the built-in resolver.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk",
    "com.cn", "net.cn", "org.cn", "gov.cn", "edu.cn",
    "com.hk", "com.tw", "com.sg", "com.au", "net.au", "org.au",
    "co.jp", "ne.jp", "or.jp", "co.kr", "co.nz", "co.in",
    "com.br", "com.mx", "com.tr", "com.ru",
    "github.io", "gitlab.io", "herokuapp.com", "appspot.com",
    "blogspot.com", "cloudfront.net", "azurewebsites.net", "workers.dev",
];

/// Resolver backed by a small suffix table; unknown suffixes are treated
/// as single-label TLDs.
#[derive(Debug, Clone)]
pub struct SuffixResolver {
    suffixes: HashSet<String>,
}

impl SuffixResolver {
    pub fn new() -> Self {
        Self::with_suffixes(MULTI_LABEL_SUFFIXES.iter().copied())
    }

    pub fn with_suffixes<'a>(suffixes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            suffixes: suffixes.into_iter().map(str::to_ascii_lowercase).collect(),
        }
    }
}

impl Default for SuffixResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainResolver for SuffixResolver {
    fn registrable_domain(&self, host: &str) -> String {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            return host;
        }

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= 2 {
            return host;
        }

        let last_two = labels[labels.len() - 2..].join(".");
        let take = if self.suffixes.contains(&last_two) { 3 } else { 2 };
        labels[labels.len().saturating_sub(take)..].join(".")
    }
}
