//! Integration tests for the watcher, the reconciler and the ignore ledger.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tagdex::ledger::IgnoreLedger;
use tagdex::model::{metadata, paths, Entry, Location};
use tagdex::service::{MemorySink, SinkEvent, UiSink};
use tagdex::store::SharedIndex;
use tagdex::watcher::{
    LocationWatcher, Reconciled, WatchEvent, WatchEventKind, WatchOptions, WatchReconciler,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn reconciler(
    location: &Location,
    entries: Vec<Entry>,
    ledger: IgnoreLedger,
) -> (WatchReconciler, SharedIndex, Arc<MemorySink>) {
    let index = SharedIndex::new();
    index.write(|store| store.load(location.uuid.clone(), entries));
    let sink = Arc::new(MemorySink::new());
    let reconciler = WatchReconciler::new(
        location,
        index.clone(),
        ledger,
        Arc::clone(&sink) as Arc<dyn UiSink>,
    )
    .unwrap();
    (reconciler, index, sink)
}

/// Unlinking an indexed file removes it from the store.
#[test]
fn test_unlink_removes_entry() {
    let location = Location::local("Docs", "/docs");
    let (reconciler, index, sink) = reconciler(
        &location,
        vec![
            Entry::new("/docs/draft.txt", true),
            Entry::new("/docs/final.txt", true),
        ],
        IgnoreLedger::default(),
    );

    let outcome = reconciler.handle(&WatchEvent::new(WatchEventKind::Unlink, "/docs/draft.txt"));

    assert_eq!(outcome, Reconciled::Removed(1));
    assert!(index.read(|s| s.find("/docs/draft.txt").is_none()));
    assert_eq!(index.read(|s| s.len()), 1);
    assert_eq!(
        sink.events(),
        vec![SinkEvent::RemoveEntries(vec!["/docs/draft.txt".to_string()])]
    );
}

/// Paths the index builder prunes stay out of the index when they appear
/// later.
#[test]
fn test_ignore_patterns_apply_to_watch_events() {
    let mut location = Location::local("Docs", "/docs");
    location.ignore_patterns = vec!["node_modules/".to_string()];
    let (reconciler, index, sink) = reconciler(&location, Vec::new(), IgnoreLedger::default());

    let outcome = reconciler.handle(&WatchEvent::new(
        WatchEventKind::Add,
        "/docs/node_modules/x.js",
    ));

    assert_eq!(outcome, Reconciled::Suppressed);
    assert!(index.read(|s| s.find("/docs/node_modules/x.js").is_none()));
    assert!(sink.events().is_empty());
}

/// Events for ignored paths are dropped until the grace period after
/// `deignore` has passed.
#[tokio::test(start_paused = true)]
async fn test_ledger_suppresses_own_changes() {
    let location = Location::local("Docs", "/docs");
    let ledger = IgnoreLedger::new(Duration::from_secs(1), Duration::from_secs(60));
    let (reconciler, index, _sink) = reconciler(&location, Vec::new(), ledger.clone());

    ledger.ignore(["/docs/moved.txt"]);
    let before = reconciler.handle(&WatchEvent::new(WatchEventKind::Add, "/docs/moved.txt"));
    assert_eq!(before, Reconciled::Ignored);

    ledger.deignore(["/docs/moved.txt"]);
    let during_grace = reconciler.handle(&WatchEvent::new(WatchEventKind::Change, "/docs/moved.txt"));
    assert_eq!(during_grace, Reconciled::Ignored);

    tokio::time::advance(Duration::from_millis(1001)).await;
    let after = reconciler.handle(&WatchEvent::new(WatchEventKind::Add, "/docs/moved.txt"));
    assert_eq!(after, Reconciled::Inserted);
    assert!(index.read(|s| s.find("/docs/moved.txt").is_some()));
}

/// A forgotten `deignore` stops suppressing after the maximum hold time.
#[tokio::test(start_paused = true)]
async fn test_ledger_max_hold() {
    let location = Location::local("Docs", "/docs");
    let ledger = IgnoreLedger::new(Duration::from_secs(1), Duration::from_secs(60));
    let (reconciler, _index, _sink) = reconciler(&location, Vec::new(), ledger.clone());

    ledger.ignore(["/docs/sub"]);
    assert_eq!(
        reconciler.handle(&WatchEvent::new(WatchEventKind::Add, "/docs/sub/a.txt")),
        Reconciled::Ignored
    );

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(
        reconciler.handle(&WatchEvent::new(WatchEventKind::Add, "/docs/sub/a.txt")),
        Reconciled::Inserted
    );
    assert!(ledger.is_empty());
}

/// Sidecar changes reload the owning directory without touching the store.
#[test]
fn test_sidecar_change_reloads_directory() {
    let location = Location::local("Docs", "/docs");
    let (reconciler, index, sink) = reconciler(
        &location,
        vec![Entry::new("/docs/a.txt", true)],
        IgnoreLedger::default(),
    );
    let sidecar = metadata::sidecar_path("/docs/a.txt");

    let outcome = reconciler.handle(&WatchEvent::new(WatchEventKind::Change, sidecar));

    assert_eq!(outcome, Reconciled::Reload("/docs".to_string()));
    assert_eq!(sink.events(), vec![SinkEvent::ReloadDirectory("/docs".to_string())]);
    assert_eq!(index.read(|s| s.len()), 1);
}

/// Files created on disk show up in the index through the live watcher.
#[tokio::test]
async fn test_live_watch_reconciles_new_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_string_lossy().into_owned();
    let location = Location::local("Live", root.clone());
    let (reconciler, index, _sink) = reconciler(&location, Vec::new(), IgnoreLedger::default());

    let watcher = LocationWatcher::new(&root, WatchOptions::default()).unwrap();
    let (guard, events) = watcher.into_parts();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(reconciler.run(events, shutdown.clone()));

    let created = paths::join(&root, "hello[new].txt");
    fs::write(&created, "hi").unwrap();

    let found = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(entry) = index.read(|s| s.find(&created).cloned()) {
                break entry;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
    assert!(found.has_tag("new"));

    shutdown.cancel();
    let stats = task.await.unwrap();
    drop(guard);
    assert!(stats.received >= 1);
    assert!(stats.applied >= 1);
}
