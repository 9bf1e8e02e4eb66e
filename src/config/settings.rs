//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum index age before a rebuild (10 minutes).
pub const DEFAULT_MAX_INDEX_AGE: Duration = Duration::from_secs(600);

/// Default global result cap.
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 1000;

/// Main configuration for the indexing and search core.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file describing the configured locations.
    pub locations_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Index age after which a location is re-indexed, unless the location
    /// sets its own.
    pub max_index_age: Duration,

    /// Default global result cap.
    pub max_search_results: usize,

    /// Delay between `deignore` and the ledger actually forgetting a path.
    pub ignore_grace: Duration,

    /// Upper bound on how long an ignored path stays in the ledger.
    pub ignore_max_hold: Duration,

    /// Largest file whose text is extracted for full-text search.
    pub text_max_bytes: u64,

    /// Maximum number of characters kept from an extracted text.
    pub text_excerpt_chars: usize,

    /// Watch depth below the location root (`None` = unlimited).
    pub watch_depth: Option<usize>,

    /// Capacity of the watcher event channel.
    pub watch_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations_file: None,
            log_level: "info".to_string(),
            log_json: false,
            max_index_age: DEFAULT_MAX_INDEX_AGE,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            ignore_grace: Duration::from_secs(1),
            ignore_max_hold: Duration::from_secs(60),
            text_max_bytes: 1024 * 1024,
            text_excerpt_chars: 16 * 1024,
            watch_depth: None,
            watch_channel_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.max_search_results == 0 {
            return Err(Error::config("max_search_results cannot be 0"));
        }

        if self.ignore_grace > self.ignore_max_hold {
            return Err(Error::config(
                "ignore_grace cannot exceed ignore_max_hold",
            ));
        }

        if self.text_excerpt_chars == 0 {
            return Err(Error::config("text_excerpt_chars cannot be 0"));
        }

        if self.watch_channel_capacity == 0 {
            return Err(Error::config("watch_channel_capacity cannot be 0"));
        }

        if let Some(path) = &self.locations_file {
            if path.as_os_str().is_empty() {
                return Err(Error::config("locations_file cannot be empty"));
            }
        }

        Ok(())
    }

    /// Index age limit in milliseconds for a location override.
    #[must_use]
    pub fn max_index_age_ms(&self, location_override: Option<u64>) -> u64 {
        location_override.unwrap_or_else(|| {
            u64::try_from(self.max_index_age.as_millis()).unwrap_or(u64::MAX)
        })
    }
}
