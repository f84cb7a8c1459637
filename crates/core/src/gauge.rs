//! Gauge sink port: the only metrics capability the domain needs.

/// "Set named gauge to value."
///
/// Implemented by the Prometheus registry in `autoshop-observability`.
pub trait GaugeSink: Send + Sync {
    fn set_gauge(&self, name: &str, value: f64);
}

/// Discards every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGaugeSink;

impl GaugeSink for NoopGaugeSink {
    fn set_gauge(&self, _name: &str, _value: f64) {}
}

impl<G: GaugeSink + ?Sized> GaugeSink for std::sync::Arc<G> {
    fn set_gauge(&self, name: &str, value: f64) {
        (**self).set_gauge(name, value)
    }
}
