//! Logging, tracing spans and Prometheus metrics.

pub mod metrics;
mod observability;

pub use metrics::{gather_metrics, init_metrics};
pub use observability::{init_tracing, spans};
