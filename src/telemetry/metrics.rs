//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::Result;

/// Entries held by the index store of the active location.
pub static INDEXED_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tagdex_indexed_entries",
        "Number of entries in the active location index"
    )
    .unwrap()
});

/// Index builds by outcome (`complete`, `cancelled`, `failed`).
pub static INDEX_BUILDS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tagdex_index_builds_total",
        "Total number of index builds",
        &["outcome"]
    )
    .unwrap()
});

/// Watch events by kind and reconciliation outcome.
pub static WATCH_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tagdex_watch_events_total",
        "Total number of filesystem watch events",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Search latency by scope (`location`, `global`).
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tagdex_search_duration_seconds",
        "Search latency in seconds",
        &["scope"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*INDEXED_ENTRIES;
    let _ = &*INDEX_BUILDS;
    let _ = &*WATCH_EVENTS;
    let _ = &*SEARCH_DURATION;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render the default registry in the text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| crate::Error::internal(format!("failed to encode metrics: {e}")))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::internal(format!("metrics are not UTF-8: {e}")))
}
