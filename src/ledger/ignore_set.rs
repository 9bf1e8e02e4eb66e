//! Paths whose watch events are caused by our own mutations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::model::{metadata, paths};

/// Time-limited set of paths whose watch events must be dropped.
///
/// `ignore` holds a path for at most `max_hold`; `deignore` releases it
/// after `grace`, so events that trail the mutation are still dropped.
/// Expired paths are purged lazily. Clone is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct IgnoreLedger {
    entries: Arc<Mutex<HashMap<String, Instant>>>,
    grace: Duration,
    max_hold: Duration,
}

impl Default for IgnoreLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl IgnoreLedger {
    #[must_use]
    pub fn new(grace: Duration, max_hold: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            grace,
            max_hold,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ignore_grace, config.ignore_max_hold)
    }

    /// Start dropping events for `targets`.
    pub fn ignore<I, S>(&self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expires_at = Instant::now() + self.max_hold;
        let mut entries = self.entries.lock();
        for path in targets {
            let path = paths::trim_trailing(path.as_ref()).to_string();
            tracing::trace!(path = %path, "Ignoring watch events");
            entries.insert(path, expires_at);
        }
    }

    /// Stop dropping events for `targets` once the grace period has passed.
    ///
    /// Paths that are not ignored are left alone.
    pub fn deignore<I, S>(&self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let release_at = Instant::now() + self.grace;
        let mut entries = self.entries.lock();
        for path in targets {
            if let Some(expires_at) = entries.get_mut(paths::trim_trailing(path.as_ref())) {
                *expires_at = (*expires_at).min(release_at);
            }
        }
    }

    /// Whether events for `path` must be dropped.
    ///
    /// Matches an ignored path itself, anything below it, and its sidecar
    /// or thumbnail in the metadata folder.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        let now = Instant::now();
        let path = paths::trim_trailing(path);
        let mut entries = self.entries.lock();
        entries.retain(|_, expires_at| *expires_at > now);

        entries.keys().any(|ignored| {
            path == ignored.as_str()
                || paths::is_descendant(path, ignored)
                || path == metadata::sidecar_path(ignored)
                || path == metadata::thumbnail_path(ignored)
        })
    }

    /// Number of paths held, expired ones included until the next check.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
