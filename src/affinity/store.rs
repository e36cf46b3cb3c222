//! Persistent URL → relay host records.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::affinity::cache::unix_now;
use crate::error::StoreResult;

/// "`url` was last served through `host`, valid until `expires`".
///
/// An empty `host` means the URL was served by a fast path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHostRecord {
    pub url: String,
    pub host: String,
    /// Unix seconds.
    pub expires: u64,
}

impl RelayHostRecord {
    /// Whether the URL was relay-routed.
    pub fn is_relayed(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires
    }
}

/// Async key-value store keyed by URL.
#[async_trait]
pub trait UrlCacheStore: Send + Sync {
    async fn get(&self, url: &str) -> StoreResult<Option<RelayHostRecord>>;
    async fn put(&self, record: RelayHostRecord) -> StoreResult<()>;
    async fn delete(&self, url: &str) -> StoreResult<()>;

    /// Persist pending changes. Stores without a backing file do nothing.
    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<String, RelayHostRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl UrlCacheStore for MemoryStore {
    async fn get(&self, url: &str) -> StoreResult<Option<RelayHostRecord>> {
        Ok(self.inner.get(url).map(|r| r.value().clone()))
    }

    async fn put(&self, record: RelayHostRecord) -> StoreResult<()> {
        self.inner.insert(record.url.clone(), record);
        Ok(())
    }

    async fn delete(&self, url: &str) -> StoreResult<()> {
        self.inner.remove(url);
        Ok(())
    }
}

/// Store persisted as a JSON array of records.
///
/// Mutations only mark the store dirty; `flush` writes the whole set to a
/// temp file and renames it over `path`. Expired relay records are pruned
/// on flush.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: DashMap<String, RelayHostRecord>,
    dirty: AtomicBool,
    writes: AtomicU64,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open `path`, loading existing records if the file exists.
    ///
    /// A file that does not parse is moved aside to `<path>.corrupt` and the
    /// store starts empty.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = DashMap::new();
        if tokio::fs::try_exists(&path).await? {
            let data = tokio::fs::read(&path).await?;
            match parse_records(&data) {
                Ok(records) => {
                    for record in records {
                        inner.insert(record.url.clone(), record);
                    }
                    tracing::info!(path = %path.display(), records = inner.len(), "Loaded affinity store");
                }
                Err(e) => {
                    let aside = sibling(&path, "corrupt");
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Affinity store unreadable, starting empty"
                    );
                    tokio::fs::rename(&path, &aside).await?;
                }
            }
        }
        Ok(Self {
            path,
            inner,
            dirty: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    /// Open `path` and flush it every `every` from a background task.
    ///
    /// The task holds a weak handle and stops once the store is dropped.
    pub async fn open_with_flush(path: impl AsRef<Path>, every: Duration) -> StoreResult<Arc<Self>> {
        let store = Arc::new(Self::open(path).await?);
        let handle = Arc::downgrade(&store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = handle.upgrade() else {
                    break;
                };
                if let Err(e) = store.flush().await {
                    tracing::warn!(path = %store.path.display(), error = %e, "Affinity flush failed");
                }
            }
        });
        Ok(store)
    }

    /// Number of times the file has been written.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Write pending changes, if any.
    pub async fn flush(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let now = unix_now();
        self.inner.retain(|_, r| !r.is_relayed() || r.is_valid_at(now));
        let mut records: Vec<RelayHostRecord> =
            self.inner.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));

        let result = write_atomic(&self.path, &records).await;
        match result {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %self.path.display(), records = records.len(), "Flushed affinity store");
            }
            Err(_) => self.dirty.store(true, Ordering::Release),
        }
        result
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

fn parse_records(data: &[u8]) -> StoreResult<Vec<RelayHostRecord>> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(data)?)
}

/// `affinity.json` → `affinity.json.<suffix>`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

async fn write_atomic(path: &Path, records: &[RelayHostRecord]) -> StoreResult<()> {
    let temp = sibling(path, "tmp");
    let data = serde_json::to_vec(records)?;
    tokio::fs::write(&temp, data).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

#[async_trait]
impl UrlCacheStore for FileStore {
    async fn get(&self, url: &str) -> StoreResult<Option<RelayHostRecord>> {
        Ok(self.inner.get(url).map(|r| r.value().clone()))
    }

    async fn put(&self, record: RelayHostRecord) -> StoreResult<()> {
        self.inner.insert(record.url.clone(), record);
        self.mark_dirty();
        Ok(())
    }

    async fn delete(&self, url: &str) -> StoreResult<()> {
        if self.inner.remove(url).is_some() {
            self.mark_dirty();
        }
        Ok(())
    }

    async fn flush(&self) -> StoreResult<()> {
        FileStore::flush(self).await
    }
}
