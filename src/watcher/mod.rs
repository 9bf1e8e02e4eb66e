//! Filesystem watching and index reconciliation.
//!
//! This module provides:
//! - Classification of raw notify events into add/unlink/change events
//! - `LocationWatcher`, a recursive watcher feeding a bounded channel
//! - `WatchReconciler`, applying events to the shared index one at a time

mod events;
mod reconciler;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{classify, classify_with, WatchEvent, WatchEventKind};
pub use reconciler::{
    Reconciled, ReconcilerStats, ReconcilerStatsSnapshot, WatchReconciler, WatchState,
};
pub use watcher::{IgnoredFn, LocationWatcher, WatchGuard, WatchOptions};
