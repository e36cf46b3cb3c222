//! The relay engine: affinity, fast paths and the failover loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::Method;
use url::Url;

use crate::affinity::{FileStore, HostAffinityCache, MemoryStore, UrlCacheStore};
use crate::config::RelayConfig;
use crate::cookies::{CookieItem, CookiePolicy, MemoryCookieJar};
use crate::dispatch::flags::AcehProbe;
use crate::dispatch::request::ProxiedRequest;
use crate::dispatch::state::{DispatchState, RelaySignal, Step};
use crate::error::{SetupError, StoreError, TransportError};
use crate::fastpath::{CdnProbe, DirectHosts, DirectProbe, ManifestCdn, NoCdn};
use crate::load_balancer::{HostSelector, RelayPool};
use crate::observability::metrics;
use crate::protocol::{
    decode_response_headers, encode_request_headers, fields, EncodeContext, HeaderList,
};
use crate::tld::SuffixResolver;
use crate::transport::{send_cancellable, HttpTransport, OutboundRequest, Transport, UpstreamResponse};
use crate::urlx::{is_http_proto, url_hash, UrlCodec};

/// Path of the relay endpoint on every relay host.
pub const RELAY_ENDPOINT: &str = "http";

/// Decoded parts of a relayed response.
#[derive(Debug, Clone)]
pub struct RelayedParts {
    /// Origin status.
    pub status: u16,
    pub headers: HeaderList,
    /// Cookies the caller may see; `None` when there are none.
    pub cookies: Option<Vec<CookieItem>>,
}

/// Result of a successful launch.
#[derive(Debug)]
pub struct Launched {
    /// The response as received. For relayed responses its status and
    /// headers are the relay's; use `relayed` for the origin's.
    pub response: UpstreamResponse,
    /// Present only when the response came through a relay.
    pub relayed: Option<RelayedParts>,
}

impl Launched {
    fn direct(response: UpstreamResponse) -> Self {
        Self {
            response,
            relayed: None,
        }
    }

    pub fn is_relayed(&self) -> bool {
        self.relayed.is_some()
    }

    /// Status the caller should see.
    pub fn status(&self) -> u16 {
        self.relayed
            .as_ref()
            .map_or(self.response.status, |parts| parts.status)
    }
}

/// Per-engine protocol settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Sent as `--ver`.
    pub version: String,
    pub max_retry: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            version: "110".to_string(),
            max_retry: 5,
        }
    }
}

/// Collaborators the engine dispatches through.
pub struct RelayComponents {
    pub selector: Arc<dyn HostSelector>,
    pub transport: Arc<dyn Transport>,
    pub affinity: Arc<HostAffinityCache>,
    pub direct: DirectProbe,
    pub cdn: Arc<dyn CdnProbe>,
    pub cookies: CookiePolicy,
    pub urls: UrlCodec,
    pub aceh: AcehProbe,
}

/// Client-side relay engine.
pub struct Relay {
    settings: RelaySettings,
    selector: Arc<dyn HostSelector>,
    transport: Arc<dyn Transport>,
    affinity: Arc<HostAffinityCache>,
    direct: DirectProbe,
    cdn: Arc<dyn CdnProbe>,
    cookies: CookiePolicy,
    urls: UrlCodec,
    aceh: AcehProbe,
}

impl Relay {
    pub fn new(settings: RelaySettings, components: RelayComponents) -> Self {
        Self {
            settings,
            selector: components.selector,
            transport: components.transport,
            affinity: components.affinity,
            direct: components.direct,
            cdn: components.cdn,
            cookies: components.cookies,
            urls: components.urls,
            aceh: components.aceh,
        }
    }

    /// Build an engine with the default collaborators: reqwest transport,
    /// in-memory cookie jar, built-in suffix table, and a file or memory
    /// affinity store opened on first use.
    pub fn from_config(config: &RelayConfig) -> Result<Self, SetupError> {
        let timeout = match config.relay.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(timeout)?);
        let urls = UrlCodec::new(&config.front.public_origin, &config.front.prefix)?;

        let cache_path = config.cache.path.clone();
        let flush_every = Duration::from_secs(config.cache.flush_interval_secs.max(1));
        let affinity = Arc::new(HostAffinityCache::new(
            move || {
                let path = cache_path.clone();
                async move {
                    let store: Arc<dyn UrlCacheStore> = match path {
                        Some(path) => FileStore::open_with_flush(path, flush_every).await?,
                        None => Arc::new(MemoryStore::new()),
                    };
                    Ok::<_, StoreError>(store)
                }
            },
            config.protocol.cache_ttl_secs,
        ));

        let cdn: Arc<dyn CdnProbe> = match &config.fast_path.cdn {
            Some(cdn) => Arc::new(ManifestCdn::from_table(
                &cdn.base_url,
                &cdn.manifest,
                transport.clone(),
            )),
            None => Arc::new(NoCdn),
        };

        let components = RelayComponents {
            selector: Arc::new(RelayPool::new(&config.relay.nodes, &config.relay.scheme)),
            direct: DirectProbe::new(
                Arc::new(DirectHosts::new(config.fast_path.direct_hosts.iter().cloned())),
                transport.clone(),
            ),
            transport,
            affinity,
            cdn,
            cookies: CookiePolicy::new(
                Arc::new(MemoryCookieJar::new()),
                Arc::new(SuffixResolver::new()),
                config.protocol.third_party_cookies,
            ),
            urls,
            aceh: AcehProbe::new(config.protocol.probe_aceh),
        };
        let settings = RelaySettings {
            version: config.protocol.version.clone(),
            max_retry: config.protocol.max_retry,
        };
        Ok(Self::new(settings, components))
    }

    pub fn cookies(&self) -> &CookiePolicy {
        &self.cookies
    }

    pub fn urls(&self) -> &UrlCodec {
        &self.urls
    }

    pub fn direct_hosts(&self) -> &Arc<DirectHosts> {
        self.direct.hosts()
    }

    pub fn aceh(&self) -> &AcehProbe {
        &self.aceh
    }

    /// Write pending affinity records; called on shutdown.
    pub async fn flush_affinity(&self) {
        self.affinity.flush().await;
    }

    /// Resolve `req` for `target`, issued from a page at `client`.
    ///
    /// Returns `None` when the network failed, the caller cancelled, no
    /// relay host was available, or every attempt was used up.
    pub async fn launch(&self, req: ProxiedRequest, target: &Url, client: &Url) -> Option<Launched> {
        let started = Instant::now();
        let (outcome, launched) = self.dispatch(req, target, client).await;
        metrics::record_launch(outcome, started.elapsed());
        launched
    }

    async fn dispatch(
        &self,
        req: ProxiedRequest,
        target: &Url,
        client: &Url,
    ) -> (&'static str, Option<Launched>) {
        if !is_http_proto(target.scheme()) {
            return self.pass_through(req, target).await;
        }

        let url = target.as_str();
        let hash = url_hash(url);

        let mut cached_host = None;
        if req.method == Method::GET {
            cached_host = self.affinity.lookup(url).await;
            if cached_host.is_none() {
                if let Some((path, response)) = self.probe_fast_paths(target, hash).await {
                    self.affinity.record_fast_path(url);
                    return (path, Some(Launched::direct(response)));
                }
            }
        }

        let ctx = EncodeContext {
            version: &self.settings.version,
            aceh_compat: self.aceh.is_active(),
            urls: &self.urls,
            cookies: &self.cookies,
        };
        let mut headers = encode_request_headers(&req, target, client, &ctx);
        let body = req.forwarded_body();
        let mut state = DispatchState::new(cached_host, self.settings.max_retry);

        let resolved = loop {
            if !state.next_attempt() {
                tracing::warn!(url = %url, attempts = state.attempts(), "Relay attempts exhausted");
                break None;
            }

            let host = match state.host() {
                Some(host) => host.to_string(),
                None => match self.selector.select_host(hash, state.level()) {
                    Some(host) => {
                        state.select_host(host.clone());
                        host
                    }
                    None => {
                        tracing::warn!(url = %url, level = state.level(), "No relay host available");
                        break None;
                    }
                },
            };

            headers.set(fields::LEVEL, state.level().to_string());
            match state.raw_info() {
                Some(info) => headers.set(fields::RAW_INFO, info),
                None => headers.remove(fields::RAW_INFO),
            }

            let request = OutboundRequest {
                url: self.selector.build_url(&host, RELAY_ENDPOINT),
                method: req.method.clone(),
                headers: headers.clone(),
                body: body.clone(),
            };
            tracing::debug!(
                url = %url,
                host = %host,
                level = state.level(),
                attempt = state.attempts(),
                "Relay attempt"
            );

            let response = match send_cancellable(self.transport.as_ref(), request, req.cancel.as_ref()).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(url = %url, host = %host, error = %e, "Relay fetch failed");
                    metrics::record_attempt("transport");
                    break None;
                }
            };

            let signal = RelaySignal::classify(&response.headers);
            metrics::record_attempt(signal.label());
            match &signal {
                RelaySignal::Error(message) => {
                    tracing::warn!(url = %url, host = %host, error = %message, "Relay reported failure");
                }
                _ => {
                    if response.headers.has(fields::PROBE) && self.aceh.disable() {
                        tracing::info!("Wildcard expose-headers supported, disabling aceh probe");
                        headers.remove(fields::ACEH);
                    }
                }
            }

            if state.apply(signal) == Step::Finish {
                break Some((host, response));
            }
        };

        let Some((host, response)) = resolved else {
            return ("failed", None);
        };

        self.affinity.record_relayed(url, &host);

        let info = decode_response_headers(response.status, &response.headers);
        let mut headers = info.headers;

        if let Some(refresh) = headers.get("refresh").map(str::to_string) {
            let rewritten = self.urls.replace_http_refresh(&refresh, target);
            if rewritten != refresh {
                tracing::debug!(refresh = %refresh, "Rewrote HTTP refresh");
                headers.set("refresh", rewritten);
            }
        }

        let cookies = if info.cookie_strs.is_empty() {
            None
        } else {
            let items = self
                .cookies
                .filter_received_cookies(&info.cookie_strs, target, client);
            (!items.is_empty()).then_some(items)
        };

        let parts = RelayedParts {
            status: info.status,
            headers,
            cookies,
        };
        (
            "relayed",
            Some(Launched {
                response,
                relayed: Some(parts),
            }),
        )
    }

    /// Non-HTTP targets are fetched as-is, without relaying. `HttpTransport`
    /// serves `data:` itself; any other scheme fails here, which the front
    /// answers with 502.
    async fn pass_through(&self, req: ProxiedRequest, target: &Url) -> (&'static str, Option<Launched>) {
        let request = OutboundRequest {
            url: target.to_string(),
            method: req.method.clone(),
            body: req.forwarded_body(),
            headers: req.headers,
        };
        match send_cancellable(self.transport.as_ref(), request, req.cancel.as_ref()).await {
            Ok(response) => ("passthrough", Some(Launched::direct(response))),
            Err(e) => {
                log_passthrough_failure(target, &e);
                ("failed", None)
            }
        }
    }

    async fn probe_fast_paths(&self, target: &Url, hash: u32) -> Option<(&'static str, UpstreamResponse)> {
        if let Some(response) = self.direct.probe(target).await {
            return Some(("direct", response));
        }
        if let Some(version) = self.cdn.file_version(hash) {
            tracing::debug!(url = %target, version, "CDN hit");
            if let Some(response) = self.cdn.fetch(hash, version).await {
                return Some(("cdn", response));
            }
        }
        None
    }
}

fn log_passthrough_failure(target: &Url, error: &TransportError) {
    match error {
        TransportError::UnsupportedScheme(_) => {
            tracing::debug!(url = %target, "No transport for scheme")
        }
        _ => tracing::warn!(url = %target, error = %error, "Pass-through fetch failed"),
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("settings", &self.settings)
            .field("selector", &self.selector)
            .field("aceh", &self.aceh.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayNodeConfig;

    fn is_send<T: Send>(_: &T) {}

    #[test]
    fn test_launch_future_is_send() {
        let mut config = RelayConfig::default();
        config.relay.nodes.push(RelayNodeConfig {
            name: "a".into(),
            host: "a.test".into(),
            weight: 1,
        });
        let relay = Relay::from_config(&config).unwrap();
        let target = Url::parse("https://example.com/").unwrap();
        let fut = relay.launch(ProxiedRequest::get(), &target, &target);
        is_send(&fut);
    }

    #[test]
    fn test_from_config_rejects_bad_origin() {
        let mut config = RelayConfig::default();
        config.front.public_origin = "::".into();
        assert!(matches!(Relay::from_config(&config), Err(SetupError::InvalidOrigin(_))));
    }

    #[test]
    fn test_launched_status() {
        let response = UpstreamResponse::new(200, HeaderList::new(), "");
        let launched = Launched {
            response,
            relayed: Some(RelayedParts {
                status: 404,
                headers: HeaderList::new(),
                cookies: None,
            }),
        };
        assert!(launched.is_relayed());
        assert_eq!(launched.status(), 404);

        let direct = Launched::direct(UpstreamResponse::new(206, HeaderList::new(), ""));
        assert_eq!(direct.status(), 206);
    }
}
