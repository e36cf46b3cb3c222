//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use relay_proxy::affinity::{HostAffinityCache, MemoryStore, RelayHostRecord, UrlCacheStore};
use relay_proxy::cookies::{CookiePolicy, MemoryCookieJar};
use relay_proxy::dispatch::{AcehProbe, Relay, RelayComponents, RelaySettings};
use relay_proxy::error::TransportError;
use relay_proxy::fastpath::{CdnProbe, DirectHosts, DirectProbe, NoCdn};
use relay_proxy::load_balancer::HostSelector;
use relay_proxy::protocol::HeaderList;
use relay_proxy::tld::SuffixResolver;
use relay_proxy::transport::{OutboundRequest, Transport, UpstreamResponse};
use relay_proxy::urlx::UrlCodec;

pub const PUBLIC_ORIGIN: &str = "http://127.0.0.1:8080";
pub const PREFIX: &str = "/-----";

type Script = dyn Fn(&OutboundRequest, usize) -> Result<UpstreamResponse, TransportError> + Send + Sync;

/// Transport answering from a closure `(request, call index)` and keeping
/// every request it saw.
pub struct ScriptedTransport {
    script: Box<Script>,
    seen: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&OutboundRequest, usize) -> Result<UpstreamResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Requests sent to relay hosts, in order.
    pub fn relay_requests(&self) -> Vec<OutboundRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with("/http"))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let index = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(request.clone());
            seen.len() - 1
        };
        (self.script)(&request, index)
    }
}

/// Selector that hands out `relay-N.test` and records `(hash, level)`.
#[derive(Debug, Default)]
pub struct RecordingSelector {
    calls: Mutex<Vec<(u32, u32)>>,
    next: AtomicU32,
    pub exhausted: bool,
}

impl RecordingSelector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            exhausted: true,
            ..Self::default()
        })
    }

    pub fn levels(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(_, level)| *level).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl HostSelector for RecordingSelector {
    fn select_host(&self, url_hash: u32, level: u32) -> Option<String> {
        self.calls.lock().unwrap().push((url_hash, level));
        if self.exhausted {
            return None;
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("relay-{n}.test"))
    }

    fn build_url(&self, host: &str, endpoint: &str) -> String {
        format!("https://{host}/{endpoint}")
    }
}

/// Everything a launch test inspects afterwards.
pub struct Harness {
    pub relay: Relay,
    pub transport: Arc<ScriptedTransport>,
    pub selector: Arc<RecordingSelector>,
    pub store: Arc<MemoryStore>,
    pub jar: Arc<MemoryCookieJar>,
    pub aceh: AcehProbe,
}

pub struct HarnessBuilder {
    transport: Arc<ScriptedTransport>,
    selector: Arc<RecordingSelector>,
    direct_hosts: Vec<String>,
    cdn: Arc<dyn CdnProbe>,
    aceh: bool,
    max_retry: u32,
    third_party_cookies: bool,
}

impl HarnessBuilder {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            transport,
            selector: RecordingSelector::new(),
            direct_hosts: Vec::new(),
            cdn: Arc::new(NoCdn),
            aceh: false,
            max_retry: 5,
            third_party_cookies: true,
        }
    }

    pub fn selector(mut self, selector: Arc<RecordingSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn direct_host(mut self, host: &str) -> Self {
        self.direct_hosts.push(host.to_string());
        self
    }

    pub fn cdn(mut self, cdn: Arc<dyn CdnProbe>) -> Self {
        self.cdn = cdn;
        self
    }

    pub fn aceh(mut self, active: bool) -> Self {
        self.aceh = active;
        self
    }

    pub fn third_party_cookies(mut self, enabled: bool) -> Self {
        self.third_party_cookies = enabled;
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let jar = Arc::new(MemoryCookieJar::new());
        let aceh = AcehProbe::new(self.aceh);
        let transport: Arc<dyn Transport> = self.transport.clone();

        let components = RelayComponents {
            selector: self.selector.clone(),
            transport: transport.clone(),
            affinity: Arc::new(HostAffinityCache::with_store(store.clone(), 604_800)),
            direct: DirectProbe::new(Arc::new(DirectHosts::new(self.direct_hosts)), transport),
            cdn: self.cdn,
            cookies: CookiePolicy::new(
                jar.clone(),
                Arc::new(SuffixResolver::new()),
                self.third_party_cookies,
            ),
            urls: UrlCodec::new(PUBLIC_ORIGIN, PREFIX).unwrap(),
            aceh: aceh.clone(),
        };
        let settings = RelaySettings {
            version: "42".to_string(),
            max_retry: self.max_retry,
        };

        Harness {
            relay: Relay::new(settings, components),
            transport: self.transport,
            selector: self.selector,
            store,
            jar,
            aceh,
        }
    }
}

/// Response with the given status and headers.
pub fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> UpstreamResponse {
    let headers: HeaderList = headers.iter().copied().collect();
    UpstreamResponse::new(status, headers, body)
}

/// Wait until `check` holds on the store; spawned cache writes are not awaited
/// by `launch`.
pub async fn eventually<F>(store: &MemoryStore, check: F) -> bool
where
    F: Fn(&MemoryStore) -> bool,
{
    for _ in 0..100 {
        if check(store) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check(store)
}

pub async fn record(store: &MemoryStore, url: &str) -> Option<RelayHostRecord> {
    store.get(url).await.unwrap()
}

/// A raw request as seen by the mock relay.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reply from the mock relay: status, headers, body.
pub type MockReply = (u16, Vec<(String, String)>, String);

/// Start a mock relay on an ephemeral port that answers each request with
/// `f(request, call index)`.
pub async fn start_mock_relay<F>(f: F) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(&SeenRequest, usize) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let f = f.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);

                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut parts = line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((k, v)) = line.split_once(':') {
                        headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
                    }
                }

                let length = headers
                    .iter()
                    .find(|(k, _)| k == "content-length")
                    .and_then(|(_, v)| v.parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body = vec![0u8; length];
                if length > 0 && reader.read_exact(&mut body).await.is_err() {
                    return;
                }

                let request = SeenRequest {
                    method,
                    path,
                    headers,
                    body,
                };
                let index = {
                    let mut log = log.lock().unwrap();
                    log.push(request.clone());
                    log.len() - 1
                };
                let (status, reply_headers, reply_body) = f(&request, index);

                let mut out = format!("HTTP/1.1 {status} Mock\r\n");
                for (k, v) in &reply_headers {
                    out.push_str(&format!("{k}: {v}\r\n"));
                }
                out.push_str(&format!(
                    "content-length: {}\r\nconnection: close\r\n\r\n{}",
                    reply_body.len(),
                    reply_body
                ));
                let _ = write.write_all(out.as_bytes()).await;
                let _ = write.shutdown().await;
            });
        }
    });

    (addr, seen)
}
