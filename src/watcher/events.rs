//! Watch event types and classification of raw notify events.

use std::path::Path;

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

/// Kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Add,
    AddDir,
    Unlink,
    UnlinkDir,
    Change,
}

impl WatchEventKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::AddDir => "addDir",
            Self::Unlink => "unlink",
            Self::UnlinkDir => "unlinkDir",
            Self::Change => "change",
        }
    }
}

impl std::fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
}

impl WatchEvent {
    #[must_use]
    pub fn new(kind: WatchEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Classify a notify event, probing the filesystem where the kind is
/// ambiguous.
#[must_use]
pub fn classify(event: &Event) -> Vec<WatchEvent> {
    classify_with(event, |path| path.is_dir())
}

/// Classify a notify event with an explicit directory probe.
///
/// Renames split into an unlink of the old path and an add of the new one.
pub fn classify_with(event: &Event, is_dir: impl Fn(&Path) -> bool) -> Vec<WatchEvent> {
    let added = |path: &Path| {
        let kind = if is_dir(path) {
            WatchEventKind::AddDir
        } else {
            WatchEventKind::Add
        };
        WatchEvent::new(kind, path.to_string_lossy())
    };
    let removed = |kind: WatchEventKind, path: &Path| WatchEvent::new(kind, path.to_string_lossy());

    match event.kind {
        EventKind::Create(CreateKind::Folder) => event
            .paths
            .iter()
            .map(|p| WatchEvent::new(WatchEventKind::AddDir, p.to_string_lossy()))
            .collect(),
        EventKind::Create(CreateKind::File) => event
            .paths
            .iter()
            .map(|p| WatchEvent::new(WatchEventKind::Add, p.to_string_lossy()))
            .collect(),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(|p| added(p)).collect()
        }
        EventKind::Remove(RemoveKind::Folder) => event
            .paths
            .iter()
            .map(|p| removed(WatchEventKind::UnlinkDir, p))
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| removed(WatchEventKind::Unlink, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![removed(WatchEventKind::Unlink, from), added(to)],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.exists() {
                    added(p)
                } else {
                    removed(WatchEventKind::Unlink, p)
                }
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => event
            .paths
            .iter()
            .map(|p| WatchEvent::new(WatchEventKind::Change, p.to_string_lossy()))
            .collect(),
        _ => Vec::new(),
    }
}
