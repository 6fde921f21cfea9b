//! Read-through cache of per-project compiled artifacts.
//!
//! Each key owns a `OnceCell`; concurrent requests for the same key wait on
//! that cell so the factory runs once. Invalidation only detaches the cell
//! from the map: a compute already in flight finishes for its waiters, and
//! the next request creates a fresh cell.

use crate::model::{ProjectId, ProjectKey};
use crate::plugin::CompiledArtifact;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Slots holding a computed value.
    pub entries: usize,
    pub hit_ratio: f64,
}

pub struct CompilationCache<K, V> {
    slots: DashMap<K, Arc<OnceCell<Arc<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

pub type ArtifactCache = CompilationCache<ProjectKey, CompiledArtifact>;

impl<K, V> Default for CompilationCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K, V> CompilationCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value for `key`, computing it with `factory` on a miss.
    ///
    /// Callers racing on one key share a single `factory` call and receive the
    /// same `Arc`. An error removes the slot so a later call retries.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Clone the cell out so the shard lock is not held across the await.
        let cell = self.slots.entry(key.clone()).or_default().clone();
        if let Some(value) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value.clone());
        }

        let computed = &AtomicBool::new(false);
        let value = match cell
            .get_or_try_init(move || async move {
                computed.store(true, Ordering::Relaxed);
                factory().await.map(Arc::new)
            })
            .await
        {
            Ok(value) => value,
            Err(err) => {
                // Only detach our own cell; an invalidation may already have replaced it.
                self.slots
                    .remove_if(&key, |_, slot| Arc::ptr_eq(slot, &cell) && !slot.initialized());
                return Err(err);
            }
        };

        if computed.load(Ordering::Relaxed) {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value.clone())
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots.get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn invalidate(&self, key: &K) {
        self.slots.remove(key);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            entries: self
                .slots
                .iter()
                .filter(|slot| slot.value().initialized())
                .count(),
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

impl<V> CompilationCache<ProjectKey, V> {
    /// Drop every revision of `project`.
    pub fn invalidate_project(&self, project: ProjectId) {
        self.slots.retain(|k, _| k.project != project);
    }
}
