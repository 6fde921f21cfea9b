//! Workspace synchronizer with MVCC generations.

use crate::cache::{ArtifactCache, CacheStats};
use crate::config::StratumConfig;
use crate::error::{Result, StratumError};
use crate::model::{Candidate, ChangeKind, Generation, PendingChangeBatch, ProjectSnapshot};
use crate::plugin::{CompiledArtifact, SemanticIndex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use stratum_api::GenerationId;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;

mod classify;
mod lifecycle;
mod reconcile;
mod watch;

pub use classify::ChangeClassifier;
pub use watch::SyncWatchHandle;

/// Counters describing synchronizer activity since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub batches_drained: u64,
    /// Distinct paths across all drained batches.
    pub changes_drained: u64,
    pub reconciliations: u64,
    pub failed_reconciliations: u64,
    pub published: u64,
    /// Publish attempts that lost the race against another writer.
    pub publish_conflicts: u64,
    /// Reconciliations running right now.
    pub active: u64,
    /// Highest number of reconciliations observed running at once.
    pub peak_concurrent: u64,
}

#[derive(Default)]
struct SyncCounters {
    batches_drained: AtomicU64,
    changes_drained: AtomicU64,
    reconciliations: AtomicU64,
    failed_reconciliations: AtomicU64,
    published: AtomicU64,
    publish_conflicts: AtomicU64,
    in_flight: AtomicU64,
    peak_concurrent: AtomicU64,
}

impl SyncCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Marks one reconciliation as running for the lifetime of the guard.
struct InFlight<'a>(&'a SyncCounters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a SyncCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_concurrent.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        return Err(StratumError::Cancelled);
    }
    Ok(())
}

/// Owns the published generation and keeps it converged with the filesystem.
///
/// - Readers take a cheap snapshot (`Arc` clone under a short read lock)
/// - Writers build a candidate off a snapshot and compare-and-publish it
/// - Watch-driven reconciliations run one at a time on a single worker
pub struct WorkspaceSynchronizer {
    current: Arc<RwLock<Arc<Generation>>>,
    index: Arc<dyn SemanticIndex>,
    cache: Arc<ArtifactCache>,
    config: StratumConfig,
    classifier: ChangeClassifier,
    /// Root of the published generation, for classifying recorded changes.
    loaded_root: std::sync::RwLock<Option<PathBuf>>,
    /// Serializes reconciliations and full loads.
    reconcile_lock: Mutex<()>,
    changes_tx: mpsc::UnboundedSender<(PathBuf, ChangeKind)>,
    published_tx: tokio::sync::watch::Sender<GenerationId>,
    pending: Arc<AtomicUsize>,
    counters: Arc<SyncCounters>,
    cancel_token: CancellationToken,
}

impl WorkspaceSynchronizer {
    /// Create the synchronizer and spawn its debounce and reconcile tasks.
    ///
    /// Must be called from within a tokio runtime. Both tasks end when the
    /// synchronizer is dropped.
    pub fn start(index: Arc<dyn SemanticIndex>, config: StratumConfig) -> Arc<Self> {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (batches_tx, batches_rx) = mpsc::unbounded_channel();
        let (published_tx, _) = tokio::sync::watch::channel(GenerationId::EMPTY);
        let cancel_token = CancellationToken::new();
        let pending = Arc::new(AtomicUsize::new(0));
        let counters = Arc::new(SyncCounters::default());

        let sync = Arc::new(Self {
            current: Arc::new(RwLock::new(Arc::new(Generation::empty()))),
            index,
            cache: Arc::new(ArtifactCache::new()),
            classifier: ChangeClassifier::new(&config.classifier),
            config,
            loaded_root: std::sync::RwLock::new(None),
            reconcile_lock: Mutex::new(()),
            changes_tx,
            published_tx,
            pending: pending.clone(),
            counters: counters.clone(),
            cancel_token: cancel_token.clone(),
        });

        tokio::spawn(watch::run_debouncer(
            changes_rx,
            batches_tx,
            sync.config.sync.quiescence(),
            pending,
            counters,
            cancel_token.clone(),
        ));
        tokio::spawn(watch::run_reconciler(
            Arc::downgrade(&sync),
            batches_rx,
            cancel_token,
        ));

        sync
    }

    /// Get the current generation (cheap operation)
    pub async fn snapshot(&self) -> Arc<Generation> {
        self.current.read().await.clone()
    }

    pub fn index(&self) -> &Arc<dyn SemanticIndex> {
        &self.index
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Receiver notified with the id of every published generation.
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<GenerationId> {
        self.published_tx.subscribe()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub fn stats(&self) -> SyncStats {
        let c = &self.counters;
        SyncStats {
            batches_drained: c.batches_drained.load(Ordering::Relaxed),
            changes_drained: c.changes_drained.load(Ordering::Relaxed),
            reconciliations: c.reconciliations.load(Ordering::Relaxed),
            failed_reconciliations: c.failed_reconciliations.load(Ordering::Relaxed),
            published: c.published.load(Ordering::Relaxed),
            publish_conflicts: c.publish_conflicts.load(Ordering::Relaxed),
            active: c.in_flight.load(Ordering::SeqCst),
            peak_concurrent: c.peak_concurrent.load(Ordering::SeqCst),
        }
    }

    /// Compiled artifact for `project` in `generation`, through the cache.
    pub async fn artifact(
        &self,
        generation: &Arc<Generation>,
        project: &Arc<ProjectSnapshot>,
    ) -> Result<Arc<CompiledArtifact>> {
        let key = project.key();
        let index = self.index.clone();
        let generation = generation.clone();
        let project = project.clone();
        self.cache
            .get_or_compute(key, move || async move {
                let payload =
                    tokio::task::spawn_blocking(move || index.compile(&generation, &project))
                        .await??;
                tracing::debug!("Compiled project {} at revision {}", key.project, key.revision);
                Ok::<_, StratumError>(CompiledArtifact {
                    project: key,
                    payload,
                })
            })
            .await
    }

    /// Swap in `candidate` if the published generation is still its base.
    ///
    /// Fails with `Transient` when another writer published first.
    async fn compare_and_publish(&self, candidate: Candidate) -> Result<GenerationId> {
        let Candidate {
            base,
            generation,
            summary,
        } = candidate;
        let id = generation.id;
        let root = generation.root().map(Path::to_path_buf);

        let mut current = self.current.write().await;
        if current.id != base {
            return Err(StratumError::Transient {
                expected: base,
                actual: current.id,
            });
        }
        *current = Arc::new(generation);

        // Invalidate before readers can start compiling against the new generation.
        if summary.full_reload {
            self.cache.clear();
        } else {
            for project in summary.changed.iter().chain(summary.removed.iter()) {
                self.cache.invalidate_project(*project);
            }
        }
        *self
            .loaded_root
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = root;
        drop(current);

        SyncCounters::bump(&self.counters.published);
        self.published_tx.send_replace(id);
        Ok(id)
    }

    /// Build a candidate with `compute` and publish it, retrying on conflicts.
    ///
    /// `compute` runs on the blocking pool against the latest snapshot and may
    /// run several times. `Ok(None)` means there was nothing to publish.
    pub(crate) async fn publish_with_retry<F>(
        &self,
        token: &CancellationToken,
        compute: F,
    ) -> Result<Option<GenerationId>>
    where
        F: Fn(&Generation, &CancellationToken) -> Result<Option<Candidate>> + Send + Sync + 'static,
    {
        let compute = Arc::new(compute);
        let mut backoff = self.config.sync.backoff();

        loop {
            ensure_active(token)?;
            let base = self.snapshot().await;
            let task_compute = compute.clone();
            let task_token = token.clone();
            let candidate =
                tokio::task::spawn_blocking(move || task_compute(base.as_ref(), &task_token)).await??;

            let Some(candidate) = candidate else {
                return Ok(None);
            };

            match self.compare_and_publish(candidate).await {
                Ok(id) => return Ok(Some(id)),
                Err(StratumError::Transient { expected, actual }) => {
                    SyncCounters::bump(&self.counters.publish_conflicts);
                    let delay = backoff.next_delay();
                    tracing::debug!(
                        "Candidate based on generation {} lost to {}; retrying in {:?}",
                        expected,
                        actual,
                        delay
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Err(StratumError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn pending_changes(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Feed `path` to the debouncer as if the watcher had reported it.
    ///
    /// Returns the classification; `None` means the path is ignored.
    pub fn record_change(&self, path: impl Into<PathBuf>) -> Option<ChangeKind> {
        let path = path.into();
        let root = self
            .loaded_root
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let kind = match root {
            Some(root) => self.classifier.classify_in(&root, &path)?,
            None => self.classifier.classify(&path)?,
        };
        if self.changes_tx.send((path, kind)).is_err() {
            tracing::warn!("Change recorded after the synchronizer shut down");
        }
        Some(kind)
    }

    /// Reconcile `batch` immediately, bypassing the debouncer.
    ///
    /// Waits for any reconciliation in flight. An empty batch publishes nothing.
    pub async fn reconcile(
        &self,
        batch: PendingChangeBatch,
        token: &CancellationToken,
    ) -> Result<Option<GenerationId>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let _guard = self.reconcile_lock.lock().await;
        let _in_flight = InFlight::enter(&self.counters);
        SyncCounters::bump(&self.counters.reconciliations);

        let index = self.index.clone();
        let classifier = self.classifier.clone();
        let batch = Arc::new(batch);
        let result = self
            .publish_with_retry(token, move |base, token| {
                reconcile::Reconciler::new(index.as_ref(), &classifier, token)
                    .apply_batch(base, &batch)
            })
            .await;

        if result.is_err() {
            SyncCounters::bump(&self.counters.failed_reconciliations);
        }
        result
    }
}

impl Drop for WorkspaceSynchronizer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
