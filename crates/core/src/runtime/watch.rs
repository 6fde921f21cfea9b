use super::*;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::Path;
use std::sync::Weak;
use std::time::Duration;

struct FsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FsWatcher {
    fn new(root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    async fn next_event_async(&mut self) -> Option<notify::Result<Event>> {
        self.rx.recv().await
    }
}

/// Stops one filesystem watch. Dropping the handle leaves the watch running.
#[derive(Debug, Clone)]
pub struct SyncWatchHandle {
    token: CancellationToken,
}

impl SyncWatchHandle {
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl stratum_api::WatchHandle for SyncWatchHandle {
    fn stop(&self) {
        self.token.cancel();
    }
}

impl WorkspaceSynchronizer {
    /// Watch `root` recursively and feed classified changes to the debouncer.
    pub fn watch(&self, root: &Path) -> Result<SyncWatchHandle> {
        let mut watcher = FsWatcher::new(root)?;
        let token = self.cancel_token.child_token();
        let task_token = token.clone();
        let changes = self.changes_tx.clone();
        let classifier = self.classifier.clone();
        let root = root.to_path_buf();

        tokio::spawn(async move {
            tracing::info!("Started watching {}", root.display());
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = watcher.next_event_async() => {
                        let event = match event {
                            Some(Ok(event)) => event,
                            Some(Err(err)) => {
                                tracing::warn!("Watcher error under {}: {}", root.display(), err);
                                continue;
                            }
                            None => break,
                        };
                        if event.kind.is_access() {
                            continue;
                        }
                        for path in event.paths {
                            let Some(kind) = classifier.classify_in(&root, &path) else {
                                continue;
                            };
                            if changes.send((path, kind)).is_err() {
                                tracing::info!("File watcher task ended for {}", root.display());
                                return;
                            }
                        }
                    }
                }
            }
            tracing::info!("File watcher task ended for {}", root.display());
        });

        Ok(SyncWatchHandle { token })
    }
}

/// Collects classified changes and hands a batch to the reconciler once no
/// new change has arrived for `quiescence`.
pub(super) async fn run_debouncer(
    mut changes: mpsc::UnboundedReceiver<(PathBuf, ChangeKind)>,
    batches: mpsc::UnboundedSender<PendingChangeBatch>,
    quiescence: Duration,
    pending: Arc<AtomicUsize>,
    counters: Arc<SyncCounters>,
    cancel_token: CancellationToken,
) {
    let mut batch = PendingChangeBatch::new();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            change = changes.recv() => {
                match change {
                    Some((path, kind)) => {
                        batch.insert(path, kind);
                        pending.store(batch.len(), Ordering::Relaxed);
                    }
                    None => break,
                }
            }
            // Re-created on every loop turn, so each change rearms the window.
            _ = tokio::time::sleep(quiescence), if !batch.is_empty() => {
                let drained = batch.take();
                pending.store(0, Ordering::Relaxed);
                SyncCounters::bump(&counters.batches_drained);
                counters
                    .changes_drained
                    .fetch_add(drained.len() as u64, Ordering::Relaxed);
                tracing::debug!("Quiescence reached; draining {} change(s)", drained.len());
                if batches.send(drained).is_err() {
                    break;
                }
            }
        }
    }
}

/// Single worker applying drained batches in order.
pub(super) async fn run_reconciler(
    sync: Weak<WorkspaceSynchronizer>,
    mut batches: mpsc::UnboundedReceiver<PendingChangeBatch>,
    cancel_token: CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            _ = cancel_token.cancelled() => break,
            batch = batches.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let Some(synchronizer) = sync.upgrade() else {
            break;
        };
        let count = batch.len();
        match synchronizer.reconcile(batch, &cancel_token).await {
            Ok(Some(id)) => tracing::info!("Reconciled {} change(s) into generation {}", count, id),
            Ok(None) => tracing::debug!("{} change(s) left the workspace unchanged", count),
            Err(StratumError::Cancelled) => break,
            Err(err) => {
                tracing::error!("Reconciliation of {} change(s) failed, batch discarded: {}", count, err)
            }
        }
    }
}
