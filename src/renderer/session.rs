//! Session store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

/// Shared, observable session value.
///
/// Every mutation bumps a version. The renderer compares versions to learn
/// whether the session changed since its last commit, and cache entries
/// subscribe once to be evicted on the next mutation.
#[derive(Debug, Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Value>>,
    version: Arc<AtomicU64>,
}

impl Session {
    pub fn new(value: Value) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self {
            tx: Arc::new(tx),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self) -> Value {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.tx.send_modify(f);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Receiver that resolves `changed()` on the next mutation.
    pub fn subscribe(&self) -> watch::Receiver<Value> {
        self.tx.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}
