//! Error types and Result aliases for tagdex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.
//!
//! Only location-level failures are meant to reach the user. Per-entry
//! failures are absorbed where they happen and never become an `Error`.

use thiserror::Error;

/// Result type alias using tagdex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tagdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Location-level failure.
    #[error("location error: {0}")]
    Location(#[from] LocationError),

    /// Backend I/O failure.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Index build or persistence error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Search error.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Location-level errors.
#[derive(Error, Debug)]
pub enum LocationError {
    /// No configured location matches.
    #[error("location not found: {0}")]
    NotFound(String),

    /// The location root cannot be reached.
    #[error("location '{location}' is unreachable: {reason}")]
    Unreachable { location: String, reason: String },

    /// No backend is registered for the location.
    #[error("no backend available for location '{0}'")]
    NoBackend(String),
}

/// Backend I/O errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Path does not exist on the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure on a path.
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote protocol failure (object store, WebDAV).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation not supported by this backend.
    #[error("operation '{0}' is not supported by this backend")]
    Unsupported(&'static str),
}

/// Index build and persistence errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Persisted index could not be decoded.
    #[error("failed to load index for '{location}': {reason}")]
    Load { location: String, reason: String },

    /// Index could not be written.
    #[error("failed to persist index for '{location}': {reason}")]
    Persist { location: String, reason: String },

    /// Invalid ignore pattern.
    #[error("invalid ignore pattern: {0}")]
    Pattern(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Backend cannot report changes.
    #[error("location '{0}' does not support change notification")]
    Unsupported(String),
}

/// Search errors.
#[derive(Error, Debug)]
pub enum SearchError {
    /// No location is active.
    #[error("no active location")]
    NoActiveLocation,

    /// Folder scope requested without a current directory.
    #[error("folder search requires a current directory")]
    MissingCurrentDirectory,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the whole location is unusable.
    #[must_use]
    pub const fn is_location_level(&self) -> bool {
        matches!(self, Self::Location(_))
    }
}

impl LocationError {
    /// Create an unreachable-location error.
    pub fn unreachable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreachable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

impl BackendError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path.into());
        }
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
