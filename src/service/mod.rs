//! Service facade over indexing, search and watching.
//!
//! This module provides:
//! - `LocationIndexService`, the operations the presentation layer calls
//! - `UiSink`, the callbacks it receives updates through
//! - `LocationRegistry`, the configured locations and the current one

mod locations;
#[allow(clippy::module_inception)]
mod service;
mod sink;

pub use locations::{LocationRegistry, StaticRegistry};
pub use service::{IndexingSummary, LocationIndexService};
pub use sink::{MemorySink, NotificationKind, NullSink, SinkEvent, UiSink};
