//! Maxage cache for load results.
//!
//! Entries are keyed by component and `path?query`. Each entry is evicted by
//! whichever comes first: its maxage timer, or the first session mutation
//! after it was written. Reads return a copy so cached results stay
//! immutable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::session::Session;
use super::LoadedNode;
use crate::ComponentId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub component: ComponentId,
    pub path_and_query: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    generation: u64,
    node: LoadedNode,
    expires_at: Instant,
    session_version: u64,
}

/// Thread-safe load cache.
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
    generation: Arc<AtomicU64>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node for `key`, unless it expired or the session moved on.
    pub(crate) fn get(&self, key: &CacheKey, session_version: u64) -> Option<LoadedNode> {
        let stale = {
            let entry = self.inner.get(key)?;
            if entry.expires_at > Instant::now() && entry.session_version == session_version {
                return Some(entry.node.clone());
            }
            entry.generation
        };
        self.evict(key, stale, "stale on read");
        None
    }

    /// Store `node` for `maxage` and arm its eviction.
    pub(crate) fn insert(&self, key: CacheKey, node: LoadedNode, maxage: Duration, session: &Session) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let mut session_rx = session.subscribe();
        self.inner.insert(
            key.clone(),
            CacheEntry {
                generation,
                node,
                expires_at: Instant::now() + maxage,
                session_version: session.version(),
            },
        );

        // Without a runtime the read-side checks above still apply.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let cache = self.clone();
        handle.spawn(async move {
            let reason = tokio::select! {
                _ = tokio::time::sleep(maxage) => "maxage elapsed",
                _ = session_rx.changed() => "session changed",
            };
            cache.evict(&key, generation, reason);
        });
    }

    /// Remove `key` only if it still holds the entry from `generation`.
    fn evict(&self, key: &CacheKey, generation: u64, reason: &str) {
        if self
            .inner
            .remove_if(key, |_, entry| entry.generation == generation)
            .is_some()
        {
            debug!(component = %key.component, path = %key.path_and_query, reason, "cache entry evicted");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}
