//! Location indexing service.
//!
//! Ties the index store, the search orchestrator, the ignore ledger and the
//! watch reconciler together behind the operations the presentation layer
//! calls.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::locations::LocationRegistry;
use super::sink::{NotificationKind, UiSink};
use crate::backend::{Backend, BackendRegistry, BackendResolver};
use crate::config::Config;
use crate::error::{SearchError, WatcherError};
use crate::indexer::{BuildOutcome, IndexPersistence, MetaFolderIndex};
use crate::ledger::{GuardedBackend, IgnoreLedger};
use crate::model::metadata::{self, SidecarMeta};
use crate::model::{now_millis, paths, Entry, Location, Tag, TagType};
use crate::search::{SearchBoxing, SearchEvent, SearchOrchestrator, SearchQuery};
use crate::store::{EntryPatch, SharedIndex};
use crate::telemetry::spans;
use crate::watcher::{
    LocationWatcher, ReconcilerStatsSnapshot, WatchOptions, WatchReconciler, WatchState,
};
use crate::Result;

/// Totals of a bulk indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingSummary {
    pub indexed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

struct WatchSession {
    location_id: String,
    shutdown: CancellationToken,
    task: JoinHandle<ReconcilerStatsSnapshot>,
}

struct ServiceInner {
    config: Arc<Config>,
    registry: Arc<dyn LocationRegistry>,
    resolver: Arc<dyn BackendResolver>,
    orchestrator: SearchOrchestrator,
    ledger: IgnoreLedger,
    sink: Arc<dyn UiSink>,
    session: Mutex<CancellationToken>,
    watch: Mutex<Option<WatchSession>>,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        if let Some(session) = self.watch.get_mut().take() {
            session.shutdown.cancel();
        }
    }
}

/// Indexing, search and watch operations over the configured locations.
///
/// Thread-safe and can be cloned cheaply.
#[derive(Clone)]
pub struct LocationIndexService {
    inner: Arc<ServiceInner>,
}

impl LocationIndexService {
    /// Service over local locations plus whatever is registered in the
    /// default backend registry, persisting indexes in the metadata folder.
    #[must_use]
    pub fn new(config: Config, registry: Arc<dyn LocationRegistry>, sink: Arc<dyn UiSink>) -> Self {
        Self::with_backends(
            config,
            registry,
            Arc::new(BackendRegistry::new()),
            Arc::new(MetaFolderIndex),
            sink,
        )
    }

    /// Service with explicit backend resolution and index persistence.
    #[must_use]
    pub fn with_backends(
        config: Config,
        registry: Arc<dyn LocationRegistry>,
        resolver: Arc<dyn BackendResolver>,
        persistence: Arc<dyn IndexPersistence>,
        sink: Arc<dyn UiSink>,
    ) -> Self {
        let config = Arc::new(config);
        let ledger = IgnoreLedger::from_config(&config);
        let orchestrator = SearchOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&resolver),
            persistence,
            SharedIndex::new(),
        );

        Self {
            inner: Arc::new(ServiceInner {
                config,
                registry,
                resolver,
                orchestrator,
                ledger,
                sink,
                session: Mutex::new(CancellationToken::new()),
                watch: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Handle to the index of the active location.
    #[must_use]
    pub fn index(&self) -> SharedIndex {
        self.inner.orchestrator.index().clone()
    }

    #[must_use]
    pub fn ledger(&self) -> &IgnoreLedger {
        &self.inner.ledger
    }

    /// Token of the current session, replacing a cancelled one.
    fn session_token(&self) -> CancellationToken {
        let mut token = self.inner.session.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    /// Cancel the running indexing or search session.
    pub fn cancel_indexing(&self) {
        self.inner.session.lock().cancel();
        tracing::info!("Indexing cancelled");
    }

    fn current_location(&self) -> Result<Location> {
        self.inner
            .registry
            .current()
            .ok_or_else(|| SearchError::NoActiveLocation.into())
    }

    fn is_current(&self, location: &Location) -> bool {
        self.inner
            .registry
            .current()
            .is_some_and(|current| current.uuid == location.uuid)
    }

    /// Surface a failure to the user once and hand it back.
    fn report<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!(error = %e, "{context}");
            self.inner
                .sink
                .show_notification(&format!("{context}: {e}"), NotificationKind::Error);
        }
        result
    }

    /// Build and persist the index of `location`.
    ///
    /// When `location` is the current one, the store takes the new index.
    ///
    /// # Errors
    ///
    /// Returns location-level failures, after notifying the sink.
    pub async fn create_location_index(&self, location: &Location) -> Result<BuildOutcome> {
        let result = self
            .inner
            .orchestrator
            .build_location(location, false, self.session_token())
            .await;
        let outcome = self.report(&format!("Indexing {} failed", location.name), result)?;

        if !outcome.cancelled && !location.disable_indexing && self.is_current(location) {
            self.index()
                .write(|store| store.load(location.uuid.clone(), outcome.entries.clone()));
        }
        Ok(outcome)
    }

    /// Index every location with indexing enabled, one after another.
    ///
    /// A failing location is reported and skipped; cancellation stops the
    /// run.
    pub async fn create_all_location_indexes(&self, extract_text: bool) -> IndexingSummary {
        let cancel = self.session_token();
        let mut summary = IndexingSummary::default();

        for location in self.inner.registry.locations() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if location.disable_indexing {
                summary.skipped += 1;
                continue;
            }

            let result = self
                .inner
                .orchestrator
                .build_location(&location, extract_text, cancel.clone())
                .await;
            match self.report(&format!("Indexing {} failed", location.name), result) {
                Ok(outcome) if outcome.cancelled => {
                    summary.cancelled = true;
                    break;
                }
                Ok(outcome) => {
                    summary.indexed += 1;
                    if self.is_current(&location) {
                        self.index()
                            .write(|store| store.load(location.uuid.clone(), outcome.entries));
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }

        tracing::info!(
            indexed = summary.indexed,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Bulk indexing finished"
        );
        if !summary.cancelled {
            self.inner.sink.show_notification(
                &format!("Indexed {} locations", summary.indexed),
                NotificationKind::Info,
            );
        }
        summary
    }

    /// Drop the in-memory index so the next search rebuilds it.
    pub fn clear_index(&self) {
        self.index().write(|store| store.clear());
    }

    /// Search the current location, or every location for a global query.
    ///
    /// A query without criteria leaves search mode: the results are
    /// cleared and nothing is evaluated.
    ///
    /// # Errors
    ///
    /// Returns location-level failures, after notifying the sink.
    pub async fn search_current_location(&self, query: &SearchQuery) -> Result<Vec<Entry>> {
        if !query.has_search_filters() {
            self.inner.sink.set_search_results(&[]);
            return Ok(Vec::new());
        }
        if query.search_boxing == SearchBoxing::Global {
            return Ok(self.search_all_locations(query).await);
        }

        let result = match self.current_location() {
            Ok(location) => {
                self.inner
                    .orchestrator
                    .search_one(&location, query, true, self.session_token())
                    .await
            }
            Err(e) => Err(e),
        };
        let results = self.report("Search failed", result)?;
        self.inner.sink.set_search_results(&results);
        Ok(results)
    }

    /// Search every configured location, appending each batch to the sink
    /// as it arrives.
    pub async fn search_all_locations(&self, query: &SearchQuery) -> Vec<Entry> {
        self.inner.sink.set_search_results(&[]);
        if !query.has_search_filters() {
            return Vec::new();
        }

        let locations = self.inner.registry.locations();
        let names: std::collections::HashMap<String, String> = locations
            .iter()
            .map(|l| (l.uuid.clone(), l.name.clone()))
            .collect();
        let active_id = self.inner.registry.current().map(|l| l.uuid);

        let mut stream = self.inner.orchestrator.search_all(
            locations,
            query.clone(),
            active_id,
            self.session_token(),
        );

        let mut results = Vec::new();
        while let Some(event) = stream.next().await {
            match event {
                SearchEvent::Batch { entries, .. } => {
                    self.inner.sink.append_search_results(&entries);
                    results.extend(entries);
                }
                SearchEvent::LocationFailed { location_id, error } => {
                    let name = names.get(&location_id).unwrap_or(&location_id);
                    self.inner.sink.show_notification(
                        &format!("Searching {name} failed: {error}"),
                        NotificationKind::Error,
                    );
                }
                SearchEvent::MaxResultsReached => {
                    self.inner.sink.show_notification(
                        &format!(
                            "Search stopped after {} results",
                            self.inner.orchestrator.result_limit(query)
                        ),
                        NotificationKind::Info,
                    );
                }
                SearchEvent::Cancelled | SearchEvent::Completed => break,
            }
        }
        results
    }

    /// Watch the current location and reconcile its index with every
    /// change.
    ///
    /// Locations that cannot or should not be watched leave the service
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no current location or the watch
    /// cannot be set up.
    pub async fn start_watching(&self) -> Result<WatchState> {
        self.stop_watching().await;

        let location = self.current_location()?;
        if location.disable_indexing || !location.watch_for_changes {
            tracing::debug!(location = %location.name, "Watching disabled for location");
            return Ok(WatchState::Idle);
        }
        let backend = self.inner.resolver.backend_for(&location)?;
        if !location.should_watch() || !backend.supports_watching() {
            return Err(WatcherError::Unsupported(location.name.clone()).into());
        }

        let index = self.index();
        if index.location_id().as_deref() != Some(location.uuid.as_str()) {
            index.write(|store| store.clear());
        }

        let reconciler = self.report(
            &format!("Watching {} failed", location.name),
            WatchReconciler::new(
                &location,
                index,
                self.inner.ledger.clone(),
                Arc::clone(&self.inner.sink),
            ),
        )?;
        let watcher = self.report(
            &format!("Watching {} failed", location.name),
            LocationWatcher::new(&location.root_path, WatchOptions::from_config(&self.inner.config)),
        )?;
        let (guard, events) = watcher.into_parts();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let _guard = guard;
                reconciler.run(events, shutdown).await
            }
            .instrument(spans::watch_span(&location.uuid, &location.root_path))
        });

        *self.inner.watch.lock() = Some(WatchSession {
            location_id: location.uuid.clone(),
            shutdown,
            task,
        });
        Ok(WatchState::Watching {
            location_id: location.uuid,
        })
    }

    /// Stop watching and wait for the reconciler to finish.
    ///
    /// Returns the reconciler stats, `None` when nothing was watched.
    pub async fn stop_watching(&self) -> Option<ReconcilerStatsSnapshot> {
        let session = self.inner.watch.lock().take()?;
        session.shutdown.cancel();
        match session.task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(error = %e, location_id = %session.location_id, "Reconciler task failed");
                None
            }
        }
    }

    #[must_use]
    pub fn watch_state(&self) -> WatchState {
        self.inner
            .watch
            .lock()
            .as_ref()
            .filter(|session| !session.task.is_finished())
            .map_or(WatchState::Idle, |session| WatchState::Watching {
                location_id: session.location_id.clone(),
            })
    }

    /// Suppress watch events for `targets` until they are deignored.
    pub fn ignore_paths<I, S>(&self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.ledger.ignore(targets);
    }

    /// Let watch events for `targets` through again after the grace period.
    pub fn deignore_paths<I, S>(&self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.ledger.deignore(targets);
    }

    /// Backend of the current location with mutations hidden from the
    /// watcher.
    fn guarded_backend(&self) -> Result<(Location, GuardedBackend)> {
        let location = self.current_location()?;
        let backend = self.inner.resolver.backend_for(&location)?;
        Ok((location, GuardedBackend::new(backend, self.inner.ledger.clone())))
    }

    /// Rename or move an entry of the current location.
    ///
    /// Within one directory the sidecar and thumbnail follow the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rename fails.
    pub async fn rename_entry(&self, from: &str, to: &str) -> Result<()> {
        let (_, backend) = self.guarded_backend()?;
        self.report("Rename failed", backend.rename(from, to).await)?;

        if paths::parent(from) == paths::parent(to) {
            for (old, new) in [
                (metadata::sidecar_path(from), metadata::sidecar_path(to)),
                (metadata::thumbnail_path(from), metadata::thumbnail_path(to)),
            ] {
                move_companion(&backend, &old, &new).await;
            }
        }

        let entry = self.index().write(|store| {
            (store.rename_path(from, to) > 0)
                .then(|| store.find(to).cloned())
                .flatten()
        });
        self.inner.sink.remove_directory_entries(&[from.to_string()]);
        if let Some(entry) = entry {
            let dir = entry.parent_directory().unwrap_or_default().to_string();
            self.inner.sink.update_directory_entries(&dir, &[entry]);
        }
        Ok(())
    }

    /// Delete an entry of the current location with its companions.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub async fn delete_entry(&self, path: &str) -> Result<()> {
        let (_, backend) = self.guarded_backend()?;
        self.report("Delete failed", backend.delete(path).await)?;

        for companion in [metadata::sidecar_path(path), metadata::thumbnail_path(path)] {
            if matches!(backend.get_properties(&companion).await, Ok(Some(_))) {
                if let Err(e) = backend.delete(&companion).await {
                    tracing::warn!(path = %companion, error = %e, "Failed to delete metadata file");
                }
            }
        }

        let removed: Vec<String> = self
            .index()
            .write(|store| store.remove_subtree(path))
            .into_iter()
            .map(|e| e.path)
            .collect();
        let removed = if removed.is_empty() {
            vec![path.to_string()]
        } else {
            removed
        };
        self.inner.sink.remove_directory_entries(&removed);
        Ok(())
    }

    /// Create a directory in the current location.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create it.
    pub async fn create_directory(&self, path: &str) -> Result<Entry> {
        let (location, backend) = self.guarded_backend()?;
        self.report("Creating directory failed", backend.create_directory(path).await)?;

        let entry = Entry::new(path, false)
            .with_location(location.uuid)
            .with_last_modified(now_millis());
        self.index().write(|store| store.upsert(entry.clone()));
        let dir = entry.parent_directory().unwrap_or_default().to_string();
        self.inner.sink.update_directory_entries(&dir, std::slice::from_ref(&entry));
        Ok(entry)
    }

    /// Replace the sidecar tags of an entry, keeping its description.
    ///
    /// Returns the entry's effective tags: sidecar tags first, then the
    /// ones in its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be written.
    pub async fn update_entry_tags(&self, path: &str, tags: Vec<Tag>) -> Result<Vec<Tag>> {
        let (_, backend) = self.guarded_backend()?;
        let sidecar = metadata::sidecar_path(path);

        let existing = match backend.read_text_file(&sidecar).await {
            Ok(json) => metadata::parse_sidecar(&json).unwrap_or_else(|e| {
                tracing::warn!(path = %sidecar, error = %e, "Replacing unreadable sidecar");
                SidecarMeta::default()
            }),
            Err(_) => SidecarMeta::default(),
        };

        if let Some(meta_dir) = paths::parent(&sidecar) {
            if !matches!(backend.get_properties(meta_dir).await, Ok(Some(_))) {
                self.report(
                    "Creating metadata folder failed",
                    backend.create_directory(meta_dir).await,
                )?;
            }
        }

        let json = sidecar_json(&tags, existing.description.as_deref())?;
        self.report("Saving tags failed", backend.write_text_file(&sidecar, &json).await)?;

        let sidecar_tags: Vec<Tag> = tags
            .into_iter()
            .map(|t| Tag {
                tag_type: TagType::Sidecar,
                ..t
            })
            .collect();
        let is_file = self
            .index()
            .read(|store| store.find(path).map(|e| e.is_file))
            .unwrap_or(true);
        let effective = metadata::merge_tags(sidecar_tags, Entry::new(path, is_file).tags);

        let updated = self.index().write(|store| {
            store
                .patch_by_path(path, EntryPatch::tags(effective.clone()))
                .then(|| store.find(path).cloned())
                .flatten()
        });
        if let Some(entry) = updated {
            let dir = entry.parent_directory().unwrap_or_default().to_string();
            self.inner.sink.update_directory_entries(&dir, &[entry]);
        }
        Ok(effective)
    }
}

async fn move_companion(backend: &dyn Backend, old: &str, new: &str) {
    if !matches!(backend.get_properties(old).await, Ok(Some(_))) {
        return;
    }
    if let Err(e) = backend.rename(old, new).await {
        tracing::warn!(from = %old, to = %new, error = %e, "Failed to move metadata file");
    }
}

#[derive(Serialize)]
struct SidecarTagOut<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    textcolor: Option<&'a str>,
}

#[derive(Serialize)]
struct SidecarOut<'a> {
    tags: Vec<SidecarTagOut<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

fn sidecar_json(tags: &[Tag], description: Option<&str>) -> Result<String> {
    let out = SidecarOut {
        tags: tags
            .iter()
            .map(|t| SidecarTagOut {
                title: &t.title,
                color: t.color.as_deref(),
                textcolor: t.text_color.as_deref(),
            })
            .collect(),
        description,
    };
    Ok(serde_json::to_string_pretty(&out)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MemorySink, SinkEvent, StaticRegistry};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: String,
        service: LocationIndexService,
        sink: Arc<MemorySink>,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        for file in files {
            std::fs::write(tmp.path().join(file), "x").unwrap();
        }
        let root = tmp.path().to_string_lossy().into_owned();
        let registry = StaticRegistry::new(vec![Location::local("Docs", root.clone()).with_uuid("docs")]);
        registry.set_current("docs").unwrap();
        let sink = Arc::new(MemorySink::new());
        let service = LocationIndexService::new(
            Config::default(),
            Arc::new(registry),
            Arc::clone(&sink) as Arc<dyn UiSink>,
        );
        Fixture {
            _tmp: tmp,
            root,
            service,
            sink,
        }
    }

    fn join(root: &str, name: &str) -> String {
        paths::join(root, name)
    }

    #[tokio::test]
    async fn test_degenerate_query_leaves_search_mode() {
        let fx = fixture(&["a.txt"]);
        let results = fx
            .service
            .search_current_location(&SearchQuery::new().forced())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(fx.sink.events(), vec![SinkEvent::SetResults(Vec::new())]);
        assert!(fx.service.index().read(|s| s.is_empty()));
    }

    #[tokio::test]
    async fn test_search_without_current_location_notifies() {
        let sink = Arc::new(MemorySink::new());
        let service = LocationIndexService::new(
            Config::default(),
            Arc::new(StaticRegistry::default()),
            Arc::clone(&sink) as Arc<dyn UiSink>,
        );
        let query = SearchQuery::new().with_tags_and(["x"]);

        assert!(service.search_current_location(&query).await.is_err());
        assert!(matches!(
            sink.events().as_slice(),
            [SinkEvent::Notification(_, NotificationKind::Error)]
        ));
    }

    #[tokio::test]
    async fn test_create_location_index_loads_current() {
        let fx = fixture(&["a.txt", "b[red].txt"]);
        let location = Location::local("Docs", fx.root.clone()).with_uuid("docs");

        let outcome = fx.service.create_location_index(&location).await.unwrap();

        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(fx.service.index().read(|s| s.len()), 2);
    }

    #[tokio::test]
    async fn test_cancel_then_new_session() {
        let fx = fixture(&["a.txt"]);
        fx.service.cancel_indexing();
        let cancelled = fx.service.create_all_location_indexes(false).await;
        // The cancelled token was replaced before the run started.
        assert!(!cancelled.cancelled);
        assert_eq!(cancelled.indexed, 1);
    }

    #[tokio::test]
    async fn test_update_entry_tags_writes_sidecar() {
        let fx = fixture(&["plan[draft].md"]);
        let query = SearchQuery::new().with_tags_and(["draft"]);
        fx.service.search_current_location(&query).await.unwrap();

        let path = join(&fx.root, "plan[draft].md");
        let tags = fx
            .service
            .update_entry_tags(&path, vec![Tag::sidecar("work").with_colors("#f00", "#fff")])
            .await
            .unwrap();

        let titles: Vec<_> = tags.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["work", "draft"]);

        let sidecar = std::fs::read_to_string(metadata::sidecar_path(&path)).unwrap();
        assert!(sidecar.contains("\"textcolor\": \"#fff\""));
        assert!(fx.service.index().read(|s| s.find(&path).unwrap().has_tag("work")));
        assert!(fx.service.ledger().is_ignored(&metadata::sidecar_path(&path)));
    }

    #[tokio::test]
    async fn test_rename_and_delete_reflected_in_store() {
        let fx = fixture(&["old.txt", "gone.txt"]);
        let query = SearchQuery::new().with_text("txt", crate::search::SearchType::Fuzzy);
        fx.service.search_current_location(&query).await.unwrap();

        let old = join(&fx.root, "old.txt");
        let new = join(&fx.root, "new[moved].txt");
        fx.service.rename_entry(&old, &new).await.unwrap();
        let gone = join(&fx.root, "gone.txt");
        fx.service.delete_entry(&gone).await.unwrap();

        let index = fx.service.index();
        assert!(index.read(|s| s.find(&old).is_none()));
        assert!(index.read(|s| s.find(&new).unwrap().has_tag("moved")));
        assert!(index.read(|s| s.find(&gone).is_none()));
        assert!(!std::path::Path::new(&gone).exists());
        assert!(fx.service.ledger().is_ignored(&new));
    }

    #[tokio::test]
    async fn test_create_directory_upserts_entry() {
        let fx = fixture(&[]);
        let dir = join(&fx.root, "projects");
        let entry = fx.service.create_directory(&dir).await.unwrap();
        assert!(!entry.is_file);
        assert!(std::path::Path::new(&dir).is_dir());
        assert!(fx.service.index().read(|s| s.find(&dir).is_some()));
    }

    #[tokio::test]
    async fn test_watch_lifecycle() {
        let fx = fixture(&["a.txt"]);
        assert_eq!(fx.service.watch_state(), WatchState::Idle);

        let state = fx.service.start_watching().await.unwrap();
        assert_eq!(
            state,
            WatchState::Watching {
                location_id: "docs".to_string()
            }
        );
        assert_eq!(fx.service.watch_state(), state);

        assert!(fx.service.stop_watching().await.is_some());
        assert_eq!(fx.service.watch_state(), WatchState::Idle);
        assert!(fx.service.stop_watching().await.is_none());
    }
}
