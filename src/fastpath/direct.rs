//! Direct cross-origin fetch for hosts known to allow it.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use url::Url;

use crate::observability::metrics;
use crate::transport::{OutboundRequest, Transport, UpstreamResponse};

/// Hosts (`host[:port]`) that may be fetched without relaying.
///
/// Reads are lock-free; the whole set is swapped on update.
#[derive(Debug, Default)]
pub struct DirectHosts {
    hosts: ArcSwap<HashSet<String>>,
}

impl DirectHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: ArcSwap::from_pointee(
                hosts.into_iter().map(|h| h.into().to_ascii_lowercase()).collect(),
            ),
        }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.load().contains(&host.to_ascii_lowercase())
    }

    pub fn insert(&self, host: &str) {
        let host = host.to_ascii_lowercase();
        self.hosts.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.insert(host.clone());
            next
        });
    }

    /// Replace the whole set.
    pub fn replace<I, S>(&self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: HashSet<String> = hosts.into_iter().map(|h| h.into().to_ascii_lowercase()).collect();
        self.hosts.store(Arc::new(next));
    }

    pub fn len(&self) -> usize {
        self.hosts.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.load().is_empty()
    }
}

/// `host[:port]` as used for direct-host matching.
fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Fetches a target directly when its host is in [`DirectHosts`].
pub struct DirectProbe {
    hosts: Arc<DirectHosts>,
    transport: Arc<dyn Transport>,
}

impl DirectProbe {
    pub fn new(hosts: Arc<DirectHosts>, transport: Arc<dyn Transport>) -> Self {
        Self { hosts, transport }
    }

    pub fn hosts(&self) -> &Arc<DirectHosts> {
        &self.hosts
    }

    /// Fetch `target` directly. Only 200 and 206 count; anything else is
    /// logged and reported as `None`.
    pub async fn probe(&self, target: &Url) -> Option<UpstreamResponse> {
        let key = host_key(target)?;
        if !self.hosts.contains(&key) {
            return None;
        }
        tracing::debug!(url = %target, "Direct hit");

        match self.transport.send(OutboundRequest::get(target.as_str())).await {
            Ok(res) if res.status == 200 || res.status == 206 => {
                metrics::record_fast_path("direct", "hit");
                Some(res)
            }
            Ok(res) => {
                tracing::warn!(url = %target, status = res.status, "Direct fetch rejected");
                metrics::record_fast_path("direct", "rejected");
                None
            }
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Direct fetch failed");
                metrics::record_fast_path("direct", "failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for DirectProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectProbe").field("hosts", &self.hosts.len()).finish()
    }
}
