//! Callbacks into the presentation layer.

use parking_lot::Mutex;

use crate::model::Entry;

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

/// Receiver of index and search updates.
///
/// Every method defaults to a no-op so a sink implements only what it shows.
pub trait UiSink: Send + Sync {
    fn show_notification(&self, _text: &str, _kind: NotificationKind) {}

    /// Replace the displayed search results.
    fn set_search_results(&self, _entries: &[Entry]) {}

    /// Append a batch to the displayed search results.
    fn append_search_results(&self, _entries: &[Entry]) {}

    /// New or changed entries of a directory.
    fn update_directory_entries(&self, _dir: &str, _entries: &[Entry]) {}

    /// Entries that disappeared.
    fn remove_directory_entries(&self, _paths: &[String]) {}

    /// Metadata of a directory changed and its listing must be re-read.
    fn reload_directory(&self, _dir: &str) {}
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl UiSink for NullSink {}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Notification(String, NotificationKind),
    SetResults(Vec<String>),
    AppendResults(Vec<String>),
    UpdateDirectory(String, Vec<String>),
    RemoveEntries(Vec<String>),
    ReloadDirectory(String),
}

/// Sink that records calls as entry paths, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded calls in order.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Take the recorded calls, leaving the sink empty.
    pub fn drain(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Paths of all displayed search results.
    #[must_use]
    pub fn result_paths(&self) -> Vec<String> {
        let mut shown = Vec::new();
        for event in self.events.lock().iter() {
            match event {
                SinkEvent::SetResults(paths) => shown.clone_from(paths),
                SinkEvent::AppendResults(paths) => shown.extend(paths.iter().cloned()),
                _ => {}
            }
        }
        shown
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

fn paths_of(entries: &[Entry]) -> Vec<String> {
    entries.iter().map(|e| e.path.clone()).collect()
}

impl UiSink for MemorySink {
    fn show_notification(&self, text: &str, kind: NotificationKind) {
        self.push(SinkEvent::Notification(text.to_string(), kind));
    }

    fn set_search_results(&self, entries: &[Entry]) {
        self.push(SinkEvent::SetResults(paths_of(entries)));
    }

    fn append_search_results(&self, entries: &[Entry]) {
        self.push(SinkEvent::AppendResults(paths_of(entries)));
    }

    fn update_directory_entries(&self, dir: &str, entries: &[Entry]) {
        self.push(SinkEvent::UpdateDirectory(dir.to_string(), paths_of(entries)));
    }

    fn remove_directory_entries(&self, paths: &[String]) {
        self.push(SinkEvent::RemoveEntries(paths.to_vec()));
    }

    fn reload_directory(&self, dir: &str) {
        self.push(SinkEvent::ReloadDirectory(dir.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_tracks_results() {
        let sink = MemorySink::new();
        sink.set_search_results(&[Entry::new("/a.txt", true)]);
        sink.append_search_results(&[Entry::new("/b.txt", true)]);
        assert_eq!(sink.result_paths(), vec!["/a.txt", "/b.txt"]);

        sink.set_search_results(&[]);
        assert!(sink.result_paths().is_empty());
        assert_eq!(sink.drain().len(), 3);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        sink.show_notification("hello", NotificationKind::Info);
        sink.reload_directory("/docs");
    }
}
