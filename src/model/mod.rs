//! Entry model and metadata extraction.
//!
//! This module provides:
//! - `Entry`, `Tag` and `Location` records
//! - Pure functions turning raw backend listings into entries
//! - Backend-neutral path helpers

mod entry;
mod location;
pub mod metadata;
pub mod paths;

pub use entry::{Entry, Tag, TagType};
pub use location::{Location, LocationType};
pub use metadata::{MetaFile, MetaListing, Properties, RawEntry, SidecarMeta};

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
