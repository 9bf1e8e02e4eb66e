//! Query evaluation and multi-location search.
//!
//! This module provides:
//! - `SearchQuery` and its criteria (tags, text, file types, size and date
//!   buckets, scope)
//! - `evaluate`, filtering an index snapshot in insertion order
//! - `SearchOrchestrator`, choosing between the cached, rebuilt and
//!   persisted index of each location and streaming global results

mod evaluator;
mod filters;
mod orchestrator;
mod query;
mod text;

pub use evaluator::{evaluate, evaluate_at, Criteria};
pub use orchestrator::{SearchEvent, SearchOrchestrator};
pub use query::{DateBucket, FileTypeGroup, SearchBoxing, SearchQuery, SearchType, SizeBucket};
pub use text::TextMatcher;
