//! CDN acceleration for common static assets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::observability::metrics;
use crate::transport::{OutboundRequest, Transport, UpstreamResponse};

/// Accelerated-fetch side channel keyed by URL hash.
#[async_trait]
pub trait CdnProbe: Send + Sync {
    /// Cached version of the resource, if the CDN carries it.
    fn file_version(&self, url_hash: u32) -> Option<u32>;

    /// Fetch a carried resource.
    async fn fetch(&self, url_hash: u32, version: u32) -> Option<UpstreamResponse>;
}

/// A CDN that carries nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCdn;

#[async_trait]
impl CdnProbe for NoCdn {
    fn file_version(&self, _url_hash: u32) -> Option<u32> {
        None
    }

    async fn fetch(&self, _url_hash: u32, _version: u32) -> Option<UpstreamResponse> {
        None
    }
}

/// CDN described by a manifest of `url hash → version`; resources live at
/// `{base_url}/{version}/{hash}`.
pub struct ManifestCdn {
    base_url: String,
    manifest: HashMap<u32, u32>,
    transport: Arc<dyn Transport>,
}

impl ManifestCdn {
    pub fn new(base_url: &str, manifest: HashMap<u32, u32>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            manifest,
            transport,
        }
    }

    /// Build from a manifest with string keys, as TOML tables require.
    pub fn from_table(
        base_url: &str,
        table: &HashMap<String, u32>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut manifest = HashMap::with_capacity(table.len());
        for (key, version) in table {
            match key.parse::<u32>() {
                Ok(hash) => {
                    manifest.insert(hash, *version);
                }
                Err(_) => tracing::warn!(key = %key, "Ignoring CDN manifest entry with non-numeric hash"),
            }
        }
        Self::new(base_url, manifest, transport)
    }

    pub fn resource_url(&self, url_hash: u32, version: u32) -> String {
        format!("{}/{}/{}", self.base_url, version, url_hash)
    }
}

#[async_trait]
impl CdnProbe for ManifestCdn {
    fn file_version(&self, url_hash: u32) -> Option<u32> {
        self.manifest.get(&url_hash).copied()
    }

    async fn fetch(&self, url_hash: u32, version: u32) -> Option<UpstreamResponse> {
        let url = self.resource_url(url_hash, version);
        match self.transport.send(OutboundRequest::get(url.as_str())).await {
            Ok(res) if res.status == 200 => {
                metrics::record_fast_path("cdn", "hit");
                Some(res)
            }
            Ok(res) => {
                tracing::warn!(url = %url, status = res.status, "CDN fetch rejected");
                metrics::record_fast_path("cdn", "rejected");
                None
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "CDN fetch failed");
                metrics::record_fast_path("cdn", "failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ManifestCdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestCdn")
            .field("base_url", &self.base_url)
            .field("entries", &self.manifest.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::protocol::HeaderList;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
            self.urls.lock().unwrap().push(request.url);
            Ok(UpstreamResponse::new(200, HeaderList::new(), "body"))
        }
    }

    #[tokio::test]
    async fn test_manifest_lookup_and_fetch() {
        let transport = Arc::new(Recorder::default());
        let table = HashMap::from([("12345".to_string(), 3), ("nope".to_string(), 1)]);
        let cdn = ManifestCdn::from_table("https://cdn.test/assets/", &table, transport.clone());

        assert_eq!(cdn.file_version(12345), Some(3));
        assert_eq!(cdn.file_version(1), None);

        let res = cdn.fetch(12345, 3).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(
            transport.urls.lock().unwrap().as_slice(),
            ["https://cdn.test/assets/3/12345".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_cdn() {
        assert_eq!(NoCdn.file_version(1), None);
        assert!(NoCdn.fetch(1, 1).await.is_none());
    }
}
