//! Applies watch events to the index of the active location.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{WatchEvent, WatchEventKind};
use crate::indexer::PathFilter;
use crate::ledger::IgnoreLedger;
use crate::model::{metadata, now_millis, paths, Entry, Location};
use crate::service::UiSink;
use crate::store::{EntryPatch, SharedIndex};
use crate::telemetry::metrics::WATCH_EVENTS;
use crate::Result;

/// Watch state of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WatchState {
    #[default]
    Idle,
    Watching { location_id: String },
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// A new entry was added to the index.
    Inserted,
    /// This many entries were removed.
    Removed(usize),
    /// An existing entry was patched.
    Touched,
    /// Metadata of this directory changed; the sink was asked to reload it.
    Reload(String),
    /// Caused by one of our own mutations.
    Ignored,
    /// Metadata-folder noise, an excluded path or a path outside the
    /// location.
    Suppressed,
    /// Nothing in the index matched.
    Unmatched,
}

impl Reconciled {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inserted | Self::Removed(_) | Self::Touched => "applied",
            Self::Reload(_) => "reload",
            Self::Ignored => "ignored",
            Self::Suppressed => "suppressed",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Statistics for reconciliation.
#[derive(Debug, Default)]
pub struct ReconcilerStats {
    pub received: AtomicU64,
    pub applied: AtomicU64,
    pub reloads: AtomicU64,
    pub ignored: AtomicU64,
    pub suppressed: AtomicU64,
    pub unmatched: AtomicU64,
}

impl ReconcilerStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ReconcilerStatsSnapshot {
        ReconcilerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &Reconciled) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Reconciled::Inserted | Reconciled::Removed(_) | Reconciled::Touched => &self.applied,
            Reconciled::Reload(_) => &self.reloads,
            Reconciled::Ignored => &self.ignored,
            Reconciled::Suppressed => &self.suppressed,
            Reconciled::Unmatched => &self.unmatched,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of reconciler stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStatsSnapshot {
    pub received: u64,
    pub applied: u64,
    pub reloads: u64,
    pub ignored: u64,
    pub suppressed: u64,
    pub unmatched: u64,
}

/// Keeps the index of one watched location consistent with its
/// filesystem, one event at a time.
pub struct WatchReconciler {
    location_id: String,
    root: String,
    filter: PathFilter,
    index: SharedIndex,
    ledger: IgnoreLedger,
    sink: Arc<dyn UiSink>,
    stats: Arc<ReconcilerStats>,
}

impl WatchReconciler {
    /// Reconciler for `location`, excluding its ignore patterns the way
    /// the index builder does.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern of the location is invalid.
    pub fn new(
        location: &Location,
        index: SharedIndex,
        ledger: IgnoreLedger,
        sink: Arc<dyn UiSink>,
    ) -> Result<Self> {
        let root = paths::trim_trailing(&location.root_path).to_string();
        let filter = PathFilter::with_patterns(&root, &location.ignore_patterns)?;
        Ok(Self {
            location_id: location.uuid.clone(),
            root,
            filter,
            index,
            ledger,
            sink,
            stats: ReconcilerStats::new(),
        })
    }

    #[must_use]
    pub fn stats(&self) -> Arc<ReconcilerStats> {
        Arc::clone(&self.stats)
    }

    /// Apply one event.
    pub fn handle(&self, event: &WatchEvent) -> Reconciled {
        let outcome = self.reconcile(event);
        self.stats.record(&outcome);
        WATCH_EVENTS
            .with_label_values(&[event.kind.as_str(), outcome.label()])
            .inc();
        tracing::trace!(kind = %event.kind, path = %event.path, outcome = outcome.label(), "Watch event handled");
        outcome
    }

    fn reconcile(&self, event: &WatchEvent) -> Reconciled {
        let path = paths::trim_trailing(&event.path);
        if !paths::is_descendant(path, &self.root) {
            return Reconciled::Suppressed;
        }
        if self.ledger.is_ignored(path) {
            tracing::debug!(kind = %event.kind, path = %path, "Dropping self-caused event");
            return Reconciled::Ignored;
        }
        let is_dir = matches!(event.kind, WatchEventKind::AddDir | WatchEventKind::UnlinkDir);
        if self.filter.excludes(path, is_dir) {
            tracing::trace!(path = %path, "Dropping event for excluded path");
            return Reconciled::Suppressed;
        }

        if let Some(meta) = metadata::classify_meta_path(path) {
            return match meta.owner_dir() {
                Some(dir) if meta.affects_entries() => {
                    self.sink.reload_directory(dir);
                    Reconciled::Reload(dir.to_string())
                }
                _ => Reconciled::Suppressed,
            };
        }

        match event.kind {
            WatchEventKind::Unlink | WatchEventKind::UnlinkDir => self.remove(path),
            WatchEventKind::Add => self.insert(path, true),
            WatchEventKind::AddDir => self.insert(path, false),
            WatchEventKind::Change => self.touch(path),
        }
    }

    fn remove(&self, path: &str) -> Reconciled {
        let removed = self.index.write(|store| store.remove_subtree(path));
        if removed.is_empty() {
            tracing::debug!(path = %path, "Removed path was not indexed");
            return Reconciled::Unmatched;
        }
        let removed_paths: Vec<String> = removed.into_iter().map(|e| e.path).collect();
        self.sink.remove_directory_entries(&removed_paths);
        Reconciled::Removed(removed_paths.len())
    }

    fn insert(&self, path: &str, is_file: bool) -> Reconciled {
        let entry = Entry::new(path, is_file)
            .with_location(self.location_id.clone())
            .with_last_modified(now_millis());
        let inserted = self.index.write(|store| store.upsert(entry.clone()));
        if !inserted {
            tracing::debug!(path = %path, "Added path was already indexed");
            return Reconciled::Unmatched;
        }
        let dir = entry.parent_directory().unwrap_or(&self.root).to_string();
        self.sink.update_directory_entries(&dir, &[entry]);
        Reconciled::Inserted
    }

    fn touch(&self, path: &str) -> Reconciled {
        let patched = self.index.write(|store| {
            store
                .patch_by_path(path, EntryPatch::last_modified(now_millis()))
                .then(|| store.find(path).cloned())
                .flatten()
        });
        let Some(entry) = patched else {
            tracing::debug!(path = %path, "Changed path was not indexed");
            return Reconciled::Unmatched;
        };
        let dir = entry.parent_directory().unwrap_or(&self.root).to_string();
        self.sink.update_directory_entries(&dir, &[entry]);
        Reconciled::Touched
    }

    /// Consume events until the channel closes or `shutdown` fires.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<WatchEvent>,
        shutdown: CancellationToken,
    ) -> ReconcilerStatsSnapshot {
        tracing::info!(location_id = %self.location_id, "Reconciler started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(&event);
                    }
                    None => {
                        tracing::info!("Watch channel closed, shutting down");
                        break;
                    }
                },
            }
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            location_id = %self.location_id,
            received = snapshot.received,
            applied = snapshot.applied,
            ignored = snapshot.ignored,
            "Reconciler stopped"
        );
        snapshot
    }
}
