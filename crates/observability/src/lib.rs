//! Tracing, logging, metrics (shared setup).

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::TracingConfig::from_env());
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Prometheus registry: HTTP counters and business gauges.
pub mod metrics;

pub use metrics::{ConnectionGuard, MetricsError, ShopMetrics};
