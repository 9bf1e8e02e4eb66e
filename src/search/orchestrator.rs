//! Single- and multi-location search.
//!
//! Decides per location whether the in-memory index can be reused, must be
//! rebuilt or can be loaded from the persisted cache, then evaluates the
//! query and streams per-location batches.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::evaluator::Criteria;
use super::query::SearchQuery;
use crate::backend::{Backend, BackendResolver};
use crate::config::Config;
use crate::indexer::{build_index, BuildOptions, BuildOutcome, IndexPersistence};
use crate::model::{now_millis, Entry, Location};
use crate::store::SharedIndex;
use crate::telemetry::metrics::SEARCH_DURATION;
use crate::telemetry::spans;
use crate::Result;

/// Progress of a global search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// Matches of one location.
    Batch {
        location_id: String,
        entries: Vec<Entry>,
    },
    /// A location could not be searched; the search goes on.
    LocationFailed { location_id: String, error: String },
    /// The result cap was hit; remaining locations were skipped.
    MaxResultsReached,
    /// The session was cancelled. Terminal.
    Cancelled,
    /// All locations were searched. Terminal.
    Completed,
}

/// Where the entries of a search came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Rebuilt,
    Persisted,
    Transient,
}

/// Resolves indexes per location and evaluates queries on them.
///
/// Clone is cheap: every field is shared.
#[derive(Clone)]
pub struct SearchOrchestrator {
    config: Arc<Config>,
    resolver: Arc<dyn BackendResolver>,
    persistence: Arc<dyn IndexPersistence>,
    index: SharedIndex,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<dyn BackendResolver>,
        persistence: Arc<dyn IndexPersistence>,
        index: SharedIndex,
    ) -> Self {
        Self {
            config,
            resolver,
            persistence,
            index,
        }
    }

    #[must_use]
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// Effective result cap of `query`, the configured default when it
    /// sets none.
    #[must_use]
    pub fn result_limit(&self, query: &SearchQuery) -> usize {
        match query.max_search_results {
            0 => self.config.max_search_results,
            max => max,
        }
    }

    /// Walk `location` and, unless cancelled or indexing is disabled,
    /// persist the result.
    ///
    /// The store is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the location has no backend or its root cannot
    /// be listed.
    pub async fn build_location(
        &self,
        location: &Location,
        extract_text: bool,
        cancel: CancellationToken,
    ) -> Result<BuildOutcome> {
        let backend = self.resolver.backend_for(location)?;
        self.build_with(backend.as_ref(), location, extract_text, cancel)
            .instrument(spans::location_span(&location.uuid, &location.name))
            .await
    }

    async fn build_with(
        &self,
        backend: &dyn Backend,
        location: &Location,
        extract_text: bool,
        cancel: CancellationToken,
    ) -> Result<BuildOutcome> {
        let options = BuildOptions::for_location(&self.config, location, extract_text, cancel);
        let outcome = build_index(backend, location, &location.root_path, &options).await?;

        if !outcome.cancelled && !location.disable_indexing {
            if let Err(e) = self
                .persistence
                .persist_index(backend, location, &outcome.entries)
                .await
            {
                tracing::warn!(location = %location.name, error = %e, "Failed to persist index");
            }
        }
        Ok(outcome)
    }

    /// Search one location.
    ///
    /// `active` marks the location whose index lives in the shared store.
    /// A cancelled search returns the matches found in what was indexed so
    /// far and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns location-level failures and invalid queries.
    pub async fn search_one(
        &self,
        location: &Location,
        query: &SearchQuery,
        active: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<Entry>> {
        let timer = SEARCH_DURATION.with_label_values(&["location"]).start_timer();
        let result = self
            .search_location(location, query, active, cancel)
            .instrument(spans::search_span("location"))
            .await;
        timer.observe_duration();
        result
    }

    async fn search_location(
        &self,
        location: &Location,
        query: &SearchQuery,
        active: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<Entry>> {
        let span = spans::location_span(&location.uuid, &location.name);
        async move {
            let backend = self.resolver.backend_for(location)?;
            let criteria = Criteria::compile(query, Local::now())?;
            let limit = self.result_limit(query);
            let now = now_millis();
            let max_age = self.config.max_index_age_ms(location.max_index_age);

            let reusable = active
                && !query.force_indexing
                && !location.disable_indexing
                && self.index.read(|store| store.is_fresh(&location.uuid, max_age, now));
            if reusable {
                tracing::debug!(location = %location.name, "Searching cached index");
                return Ok(self.index.read(|store| {
                    select(store.get(), &criteria, location, backend.as_ref(), limit)
                }));
            }

            let (entries, source) = self
                .resolve_entries(backend.as_ref(), location, query, active, cancel)
                .await?;
            tracing::debug!(
                location = %location.name,
                entries = entries.len(),
                source = ?source,
                "Resolved index"
            );
            Ok(select(&entries, &criteria, location, backend.as_ref(), limit))
        }
        .instrument(span)
        .await
    }

    /// Entries to search when the store cannot be reused.
    async fn resolve_entries(
        &self,
        backend: &dyn Backend,
        location: &Location,
        query: &SearchQuery,
        active: bool,
        cancel: CancellationToken,
    ) -> Result<(Vec<Entry>, Source)> {
        if location.disable_indexing {
            let outcome = self.build_with(backend, location, false, cancel).await?;
            return Ok((outcome.entries, Source::Transient));
        }

        if active {
            let outcome = self.build_with(backend, location, false, cancel).await?;
            if outcome.cancelled {
                return Ok((outcome.entries, Source::Transient));
            }
            let entries = outcome.entries;
            self.index
                .write(|store| store.load(location.uuid.clone(), entries.clone()));
            return Ok((entries, Source::Rebuilt));
        }

        if !query.force_indexing {
            let loaded = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok((Vec::new(), Source::Transient)),
                loaded = self.persistence.load_index(backend, location) => loaded,
            };
            match loaded {
                Ok(Some(entries)) => return Ok((entries, Source::Persisted)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(location = %location.name, error = %e, "Ignoring unreadable persisted index");
                }
            }
        }

        let outcome = self.build_with(backend, location, false, cancel).await?;
        Ok((outcome.entries, Source::Transient))
    }

    /// Search `locations` one after another on a spawned task.
    ///
    /// Each location contributes one `Batch` as soon as it is searched. The
    /// stream ends with `Completed` or `Cancelled`.
    #[must_use]
    pub fn search_all(
        &self,
        locations: Vec<Location>,
        query: SearchQuery,
        active_id: Option<String>,
        cancel: CancellationToken,
    ) -> ReceiverStream<SearchEvent> {
        let (tx, rx) = mpsc::channel(locations.len() + 2);
        let this = self.clone();

        tokio::spawn(async move {
            let timer = SEARCH_DURATION.with_label_values(&["global"]).start_timer();
            this.run_global(&locations, &query, active_id.as_deref(), &cancel, &tx)
                .instrument(spans::search_span("global"))
                .await;
            timer.observe_duration();
        });

        ReceiverStream::new(rx)
    }

    async fn run_global(
        &self,
        locations: &[Location],
        query: &SearchQuery,
        active_id: Option<&str>,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<SearchEvent>,
    ) {
        let cap = self.result_limit(query);
        let mut total = 0usize;

        for location in locations {
            if cancel.is_cancelled() {
                let _ = tx.send(SearchEvent::Cancelled).await;
                return;
            }
            if total >= cap {
                break;
            }

            let active = active_id == Some(location.uuid.as_str());
            let result = self
                .search_location(location, query, active, cancel.clone())
                .await;

            if cancel.is_cancelled() {
                let _ = tx.send(SearchEvent::Cancelled).await;
                return;
            }

            let event = match result {
                Ok(mut entries) => {
                    entries.truncate(cap - total);
                    total += entries.len();
                    SearchEvent::Batch {
                        location_id: location.uuid.clone(),
                        entries,
                    }
                }
                Err(e) => {
                    tracing::warn!(location = %location.name, error = %e, "Location search failed");
                    SearchEvent::LocationFailed {
                        location_id: location.uuid.clone(),
                        error: e.to_string(),
                    }
                }
            };
            if tx.send(event).await.is_err() {
                tracing::debug!("Search stream dropped");
                return;
            }
        }

        if total >= cap {
            tracing::info!(cap, "Maximum search results reached");
            if tx.send(SearchEvent::MaxResultsReached).await.is_err() {
                return;
            }
        }
        let _ = tx.send(SearchEvent::Completed).await;
    }
}

/// Matching entries in index order, at most `limit`.
///
/// Cloud results skip directories and point at the backend's browsable URL.
fn select(
    entries: &[Entry],
    criteria: &Criteria<'_>,
    location: &Location,
    backend: &dyn Backend,
    limit: usize,
) -> Vec<Entry> {
    let cloud = location.is_cloud();
    entries
        .iter()
        .filter(|entry| !(cloud && !entry.is_file))
        .filter(|entry| criteria.matches(entry))
        .take(limit)
        .map(|entry| {
            let mut entry = entry.clone();
            if cloud {
                entry.url = backend.browsable_url(&entry.path);
                entry.thumbnail_path = entry
                    .thumbnail_path
                    .as_deref()
                    .and_then(|thumb| backend.browsable_url(thumb));
            }
            entry
        })
        .collect()
}
