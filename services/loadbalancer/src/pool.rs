//! Backend pool management.
//!
//! The pool manager is the only owner of the backend sequence and the
//! metrics map. It is mutated by registration, metrics pushes, the
//! dispatcher (on dial failure), and the health checker; it is read by
//! the dispatcher for every placement decision.
//!
//! The backend sequence is a copy-on-write `Vec` behind an
//! atomically-swapped pointer (`arc-swap`). A `snapshot()` is a clone of
//! the `Arc`, never mutated in place, so the length and the element at
//! each index agree for the lifetime of one placement decision — readers
//! never observe a torn state.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use tokio::sync::RwLock;

/// A backend endpoint: a `(host, port)` pair. Identity and equality are
/// the pair; insertion order among backends is the index space used by
/// placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Backend {
    pub host: String,
    pub port: u16,
}

impl Backend {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The canonical `"host:port"` identity string.
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a `"host:port"` identity string. Returns `None` for anything
    /// that isn't a non-empty host followed by a valid port.
    pub fn parse_id(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        let host = host.trim();
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.trim().parse().ok()?;
        Some(Self::new(host, port))
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The shared backend registry: an ordered, deduplicated backend
/// sequence plus a last-write-wins metrics record per backend.
pub struct PoolManager {
    backends: ArcSwap<Vec<Backend>>,
    metrics: RwLock<HashMap<String, Value>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            backends: ArcSwap::from_pointee(Vec::new()),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent insert. Returns whether the backend was newly added.
    pub fn add(&self, backend: Backend) -> bool {
        let added = Cell::new(false);
        self.backends.rcu(|current| {
            if current.iter().any(|b| b == &backend) {
                added.set(false);
                (**current).clone()
            } else {
                added.set(true);
                let mut next = (**current).clone();
                next.push(backend.clone());
                next
            }
        });
        added.get()
    }

    /// Remove a backend. No-op if absent. Returns whether it was present.
    fn remove_from_sequence(&self, backend: &Backend) -> bool {
        let removed = Cell::new(false);
        self.backends.rcu(|current| {
            if current.iter().any(|b| b == backend) {
                removed.set(true);
                current
                    .iter()
                    .filter(|b| *b != backend)
                    .cloned()
                    .collect::<Vec<_>>()
            } else {
                removed.set(false);
                (**current).clone()
            }
        });
        removed.get()
    }

    /// Remove a backend and evict its metrics record, if present.
    pub async fn remove(&self, backend: &Backend) {
        if self.remove_from_sequence(backend) {
            self.metrics.write().await.remove(&backend.id());
        }
    }

    /// An immutable, indexed snapshot of the current backend sequence,
    /// safe to index without holding any lock.
    pub fn snapshot(&self) -> Arc<Vec<Backend>> {
        self.backends.load_full()
    }

    /// Update or insert the metrics record for `backend_id`. If
    /// `backend_id` parses as `host:port` and the backend is not yet in
    /// the pool, it is auto-registered.
    pub async fn set_metrics(&self, backend_id: &str, json: Value) {
        if let Some(backend) = Backend::parse_id(backend_id) {
            self.add(backend);
        }
        self.metrics.write().await.insert(backend_id.to_string(), json);
    }

    /// Snapshot read of the metrics map.
    pub async fn get_metrics(&self) -> HashMap<String, Value> {
        self.metrics.read().await.clone()
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}
