//! Location watcher using notify-rs.

#![allow(clippy::used_underscore_binding)]

use std::path::Path;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::events::{classify, WatchEvent};
use crate::config::Config;
use crate::error::WatcherError;
use crate::indexer::filter::is_junk_name;
use crate::model::paths;
use crate::Result;

/// Predicate dropping paths at the source.
pub type IgnoredFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Watch subscription options.
#[derive(Clone)]
pub struct WatchOptions {
    /// Directory levels below the root to report (`None` = unbounded).
    pub depth: Option<usize>,
    /// Paths for which no event is forwarded.
    pub ignored: Option<IgnoredFn>,
    /// Capacity of the event channel.
    pub channel_capacity: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            depth: None,
            ignored: None,
            channel_capacity: 256,
        }
    }
}

impl std::fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchOptions")
            .field("depth", &self.depth)
            .field("ignored", &self.ignored.is_some())
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl WatchOptions {
    /// Options from `config`, dropping platform junk files.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            depth: config.watch_depth,
            ignored: Some(Arc::new(|path: &str| is_junk_name(paths::file_name(path)))),
            channel_capacity: config.watch_channel_capacity,
        }
    }
}

/// Recursive watcher over one location root.
///
/// Dropping the watcher stops notification and closes the channel.
pub struct LocationWatcher {
    _watcher: RecommendedWatcher,
    root: String,
    event_rx: mpsc::Receiver<WatchEvent>,
}

impl LocationWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or cannot be watched.
    pub fn new(root: &str, options: WatchOptions) -> Result<Self> {
        if !Path::new(root).is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let (event_tx, event_rx) = mpsc::channel(options.channel_capacity.max(1));
        let watch_root = paths::trim_trailing(root).to_string();
        let filter_root = watch_root.clone();

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in classify(&event) {
                        if !within_depth(&filter_root, &change.path, options.depth) {
                            continue;
                        }
                        if options.ignored.as_ref().is_some_and(|f| f(&change.path)) {
                            continue;
                        }
                        // Receiver gone means the watch session ended.
                        if event_tx.blocking_send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Watch error");
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: root.to_string(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(Path::new(&watch_root), RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(root = %watch_root, "Watching location");

        Ok(Self {
            _watcher: watcher,
            root: watch_root,
            event_rx,
        })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the watcher has shut down.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }

    /// Split into the receiving end and a guard keeping the watch alive.
    #[must_use]
    pub fn into_parts(self) -> (WatchGuard, mpsc::Receiver<WatchEvent>) {
        (
            WatchGuard {
                _watcher: self._watcher,
                root: self.root,
            },
            self.event_rx,
        )
    }
}

/// Keeps the underlying notify watcher alive.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
    root: String,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        tracing::info!(root = %self.root, "Stopped watching location");
    }
}

/// Whether `path` lies at most `depth` directory levels below `root`.
fn within_depth(root: &str, path: &str, depth: Option<usize>) -> bool {
    let Some(depth) = depth else {
        return true;
    };
    let Some(rest) = path.strip_prefix(root) else {
        return true;
    };
    paths::segments(rest).count() <= depth + 1
}
