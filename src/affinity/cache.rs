//! Host-affinity cache over a lazily opened store.

use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::affinity::store::{RelayHostRecord, UrlCacheStore};
use crate::error::{StoreError, StoreResult};
use crate::observability::metrics;

/// Unix seconds now.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

type Opener = Box<dyn Fn() -> BoxFuture<'static, StoreResult<Arc<dyn UrlCacheStore>>> + Send + Sync>;

/// URL → relay host memory with a fixed TTL.
///
/// Writes and deletes are spawned and never awaited by the dispatcher: a
/// lost write costs a future cache miss, and same-URL races resolve as
/// last-write-wins.
pub struct HostAffinityCache {
    store: OnceCell<Arc<dyn UrlCacheStore>>,
    opener: Opener,
    ttl_secs: u64,
}

impl HostAffinityCache {
    /// Cache whose store is opened by `opener` on first use.
    pub fn new<F, Fut>(opener: F, ttl_secs: u64) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Arc<dyn UrlCacheStore>>> + Send + 'static,
    {
        Self {
            store: OnceCell::new(),
            opener: Box::new(move || opener().boxed()),
            ttl_secs,
        }
    }

    /// Cache over an already open store.
    pub fn with_store(store: Arc<dyn UrlCacheStore>, ttl_secs: u64) -> Self {
        let cache = Self::new(
            {
                let store = store.clone();
                move || {
                    let store = store.clone();
                    async move { Ok::<_, StoreError>(store) }
                }
            },
            ttl_secs,
        );
        let _ = cache.store.set(store);
        cache
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    async fn store(&self) -> StoreResult<Arc<dyn UrlCacheStore>> {
        self.store
            .get_or_try_init(|| (self.opener)())
            .await
            .cloned()
    }

    /// Relay host remembered for `url`, if still valid.
    ///
    /// Expired relay records are deleted in the background. Store failures
    /// and fast-path records read as a miss.
    pub async fn lookup(self: &Arc<Self>, url: &str) -> Option<String> {
        let record = match self.store().await {
            Ok(store) => store.get(url).await,
            Err(e) => Err(e),
        };
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Affinity lookup failed");
                None
            }
        };

        match record {
            Some(r) if r.is_relayed() => {
                if r.is_valid_at(unix_now()) {
                    metrics::record_affinity("hit");
                    Some(r.host)
                } else {
                    metrics::record_affinity("expired");
                    self.spawn_delete(url);
                    None
                }
            }
            _ => {
                metrics::record_affinity("miss");
                None
            }
        }
    }

    /// Remember that `url` was served through `host`.
    pub fn record_relayed(self: &Arc<Self>, url: &str, host: &str) -> JoinHandle<()> {
        self.spawn_put(RelayHostRecord {
            url: url.to_string(),
            host: host.to_string(),
            expires: unix_now() + self.ttl_secs,
        })
    }

    /// Remember that `url` was served without relaying.
    pub fn record_fast_path(self: &Arc<Self>, url: &str) -> JoinHandle<()> {
        self.spawn_put(RelayHostRecord {
            url: url.to_string(),
            host: String::new(),
            expires: 0,
        })
    }

    /// Persist pending writes if the store has been opened.
    pub async fn flush(&self) {
        if let Some(store) = self.store.get() {
            if let Err(e) = store.flush().await {
                tracing::warn!(error = %e, "Affinity flush failed");
            }
        }
    }

    fn spawn_put(self: &Arc<Self>, record: RelayHostRecord) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let url = record.url.clone();
            let result = match this.store().await {
                Ok(store) => store.put(record).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(url = %url, error = %e, "Affinity write dropped");
            }
        })
    }

    fn spawn_delete(self: &Arc<Self>, url: &str) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let url = url.to_string();
        tokio::spawn(async move {
            let result = match this.store().await {
                Ok(store) => store.delete(&url).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(url = %url, error = %e, "Affinity delete dropped");
            }
        })
    }
}

impl std::fmt::Debug for HostAffinityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAffinityCache")
            .field("open", &self.store.initialized())
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}
