//! Configuration management for tagdex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`TAGDEX_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, DEFAULT_MAX_INDEX_AGE, DEFAULT_MAX_SEARCH_RESULTS};
