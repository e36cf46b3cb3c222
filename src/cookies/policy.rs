//! Cross-origin cookie policy.

use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::cookies::jar::{CookieItem, CookieJar};
use crate::tld::DomainResolver;

/// Request credentials mode, as in the Fetch standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl FromStr for CredentialsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "omit" => Ok(Self::Omit),
            "same-origin" => Ok(Self::SameOrigin),
            "include" => Ok(Self::Include),
            other => Err(format!("unknown credentials mode: {other}")),
        }
    }
}

/// Decides which cookies leave with a request and which come back to the
/// caller.
#[derive(Clone)]
pub struct CookiePolicy {
    jar: Arc<dyn CookieJar>,
    domains: Arc<dyn DomainResolver>,
    third_party_enabled: bool,
}

impl CookiePolicy {
    pub fn new(
        jar: Arc<dyn CookieJar>,
        domains: Arc<dyn DomainResolver>,
        third_party_enabled: bool,
    ) -> Self {
        Self {
            jar,
            domains,
            third_party_enabled,
        }
    }

    pub fn jar(&self) -> &Arc<dyn CookieJar> {
        &self.jar
    }

    fn same_site(&self, a: &Url, b: &Url) -> bool {
        let a = self.domains.registrable_domain(a.host_str().unwrap_or_default());
        let b = self.domains.registrable_domain(b.host_str().unwrap_or_default());
        a == b
    }

    /// Cookie header value for a request to `target` made from `client`.
    pub fn send_cookies(&self, target: &Url, client: &Url, mode: CredentialsMode) -> String {
        match mode {
            CredentialsMode::Omit => String::new(),
            CredentialsMode::SameOrigin if !self.same_site(target, client) => String::new(),
            _ => self.jar.concat(target),
        }
    }

    /// Cookies from a response that the caller is allowed to observe.
    ///
    /// httpOnly cookies are dropped here; only the relay side may hold them.
    pub fn filter_received_cookies(
        &self,
        raw: &[String],
        response_url: &Url,
        client: &Url,
    ) -> Vec<CookieItem> {
        if !self.third_party_enabled && !self.same_site(response_url, client) {
            return Vec::new();
        }
        raw.iter()
            .filter_map(|s| self.jar.parse(s, response_url))
            .filter(|item| !item.http_only)
            .collect()
    }
}

impl std::fmt::Debug for CookiePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookiePolicy")
            .field("third_party_enabled", &self.third_party_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::jar::MemoryCookieJar;
    use crate::tld::SuffixResolver;
    use std::collections::HashMap;

    /// Resolver with a fixed host → domain table.
    struct FixedResolver(HashMap<&'static str, &'static str>);

    impl DomainResolver for FixedResolver {
        fn registrable_domain(&self, host: &str) -> String {
            self.0.get(host).copied().unwrap_or(host).to_string()
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn seeded(third_party: bool, resolver: Arc<dyn DomainResolver>) -> CookiePolicy {
        let jar = Arc::new(MemoryCookieJar::new());
        let target = url("https://a.site-one.test/");
        jar.set(jar.parse("k=v; Domain=site-one.test", &target).unwrap());
        CookiePolicy::new(jar, resolver, third_party)
    }

    #[test]
    fn test_credentials_mode_parse() {
        assert_eq!("omit".parse::<CredentialsMode>(), Ok(CredentialsMode::Omit));
        assert_eq!("Same-Origin".parse::<CredentialsMode>(), Ok(CredentialsMode::SameOrigin));
        assert_eq!("include".parse::<CredentialsMode>(), Ok(CredentialsMode::Include));
        assert!("bogus".parse::<CredentialsMode>().is_err());
    }

    #[test]
    fn test_include_always_concats() {
        let policy = seeded(true, Arc::new(SuffixResolver::new()));
        let target = url("https://a.site-one.test/x");
        let expected = policy.jar().concat(&target);
        assert_eq!(expected, "k=v");

        for client in ["https://site-one.test/", "https://unrelated.example/"] {
            assert_eq!(
                policy.send_cookies(&target, &url(client), CredentialsMode::Include),
                expected
            );
        }
    }

    #[test]
    fn test_omit_sends_nothing() {
        let policy = seeded(true, Arc::new(SuffixResolver::new()));
        let target = url("https://a.site-one.test/");
        assert_eq!(policy.send_cookies(&target, &target, CredentialsMode::Omit), "");
    }

    #[test]
    fn test_same_origin_uses_registrable_domain() {
        let resolver = FixedResolver(HashMap::from([
            ("a.site-one.test", "site-one.test"),
            ("b.site-one.test", "site-one.test"),
            ("c.other.test", "other.test"),
        ]));
        let policy = seeded(true, Arc::new(resolver));
        let target = url("https://a.site-one.test/");

        let same = policy.send_cookies(&target, &url("https://b.site-one.test/"), CredentialsMode::SameOrigin);
        assert_eq!(same, "k=v");

        let cross = policy.send_cookies(&target, &url("https://c.other.test/"), CredentialsMode::SameOrigin);
        assert_eq!(cross, "");
    }

    #[test]
    fn test_received_cookies_drop_http_only() {
        let policy = seeded(true, Arc::new(SuffixResolver::new()));
        let raw = vec![
            "visible=1; Path=/".to_string(),
            "secret=2; HttpOnly".to_string(),
            "garbage".to_string(),
        ];
        let items = policy.filter_received_cookies(
            &raw,
            &url("https://www.example.com/"),
            &url("https://www.example.com/"),
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "visible");
    }

    #[test]
    fn test_third_party_cookies_disabled() {
        let policy = seeded(false, Arc::new(SuffixResolver::new()));
        let raw = vec!["t=1".to_string()];

        let cross = policy.filter_received_cookies(
            &raw,
            &url("https://tracker.net/pixel"),
            &url("https://www.example.com/"),
        );
        assert!(cross.is_empty());

        let first = policy.filter_received_cookies(
            &raw,
            &url("https://static.example.com/x"),
            &url("https://www.example.com/"),
        );
        assert_eq!(first.len(), 1);
    }
}
