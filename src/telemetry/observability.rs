//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Spans for indexing, search and watch sessions

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!(level, json, "Tracing initialized");
}

/// Spans shared by the long-running operations.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span for building or loading the index of one location.
    #[must_use]
    pub fn location_span(location_id: &str, name: &str) -> Span {
        info_span!("location", location_id = %location_id, name = %name)
    }

    /// Span for one search, `scope` being `location` or `global`.
    #[must_use]
    pub fn search_span(scope: &str) -> Span {
        info_span!("search", scope = %scope)
    }

    /// Span for the watch session of a location.
    #[must_use]
    pub fn watch_span(location_id: &str, root: &str) -> Span {
        info_span!("watch", location_id = %location_id, root = %root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_span() {
        let span = spans::location_span("loc-1", "Docs");
        let _guard = span.enter();
    }

    #[test]
    fn test_nested_spans() {
        let outer = spans::search_span("global");
        let _outer = outer.enter();
        let inner = spans::watch_span("loc-1", "/docs");
        let _inner = inner.enter();
    }
}
