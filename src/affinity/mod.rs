//! Host-affinity subsystem.
//!
//! # Data Flow
//! ```text
//! launch (GET only)
//!     → cache.rs lookup(url)
//!         → store.rs get (store opened once, on first use)
//!         → valid relay record   → reuse host at level 0
//!         → expired relay record → background delete, miss
//!         → fast-path record     → miss (probe fast paths again)
//!
//! after a resolved attempt
//!     → record_relayed (host, now + TTL) | record_fast_path (host "", 0)
//!     → spawned put, never awaited
//!     → file store: marked dirty, flushed on an interval (tmp + rename)
//! ```
//!
//! # Design Decisions
//! - The store is advisory: stale reads and lost writes are tolerated
//! - One lazily opened handle per process, guarded by a `OnceCell`

pub mod cache;
pub mod store;

pub use cache::{unix_now, HostAffinityCache};
pub use store::{FileStore, MemoryStore, RelayHostRecord, UrlCacheStore};
