//! Prometheus metrics.
//!
//! One registry per process, owned by [`ShopMetrics`] rather than the global
//! default so tests can build as many as they like. Every metric is prefixed
//! `autoshop_`.

use std::collections::HashMap;
use std::time::Duration;

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use thiserror::Error;
use tracing::debug;

use autoshop_analytics::metrics::GAUGES;
use autoshop_core::GaugeSink;

const PREFIX: &str = "autoshop";

/// Request latency buckets, seconds.
pub const LATENCY_BUCKETS: [f64; 5] = [0.1, 0.5, 1.0, 2.0, 5.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics output is not utf-8")]
    Encoding,
}

#[derive(Clone)]
pub struct ShopMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    connections: IntGauge,
    errors: IntCounterVec,
    business: HashMap<&'static str, Gauge>,
}

impl ShopMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests handled").namespace(PREFIX),
            &["method", "route", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .namespace(PREFIX)
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "route"],
        )?;
        let connections = IntGauge::with_opts(
            Opts::new("active_connections", "Requests currently in flight").namespace(PREFIX),
        )?;
        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Server error responses").namespace(PREFIX),
            &["status"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        let mut business = HashMap::with_capacity(GAUGES.len());
        for name in GAUGES {
            let gauge = Gauge::with_opts(Opts::new(name, business_help(name)).namespace(PREFIX))?;
            registry.register(Box::new(gauge.clone()))?;
            business.insert(name, gauge);
        }

        Ok(Self {
            registry,
            requests,
            latency,
            connections,
            errors,
            business,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one finished request. `route` should be the matched path
    /// template, not the raw URI, to keep label cardinality bounded.
    pub fn record_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.requests
            .with_label_values(&[method, route, status.as_str()])
            .inc();
        self.latency
            .with_label_values(&[method, route])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, status: &str) {
        self.errors.with_label_values(&[status]).inc();
    }

    /// Bump the in-flight gauge until the guard drops.
    pub fn connection(&self) -> ConnectionGuard {
        self.connections.inc();
        ConnectionGuard {
            gauge: self.connections.clone(),
        }
    }

    pub fn active_connections(&self) -> i64 {
        self.connections.get()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| MetricsError::Encoding)
    }
}

impl GaugeSink for ShopMetrics {
    fn set_gauge(&self, name: &str, value: f64) {
        match self.business.get(name) {
            Some(g) => g.set(value),
            None => debug!(gauge = name, "ignoring unregistered gauge"),
        }
    }
}

fn business_help(name: &str) -> String {
    format!("Business metric: {}", name.replace('_', " "))
}

/// Decrements `active_connections` on drop.
pub struct ConnectionGuard {
    gauge: IntGauge,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
