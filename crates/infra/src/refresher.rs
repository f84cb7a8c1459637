//! Periodic business-metrics refresh.
//!
//! Recomputes the dashboard counters on a fixed interval and pushes them into
//! a [`GaugeSink`]. Runs once immediately on start. A failed cycle is logged
//! and retried on the next tick; it never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use autoshop_core::GaugeSink;

use crate::services::AnalyticsService;
use crate::store::ShopStore;

#[derive(Debug, Clone, Copy)]
pub struct BusinessMetricsRefresher {
    pub interval: Duration,
}

impl Default for BusinessMetricsRefresher {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Dropping the handle also stops the task, but without waiting for it.
pub struct RefresherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    trigger: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    /// Run a cycle now instead of waiting for the next tick. Repeated calls
    /// before the task wakes collapse into one cycle.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take()
            && let Err(e) = join.await
        {
            warn!(error = %e, "metrics refresher task ended abnormally");
        }
    }
}

impl BusinessMetricsRefresher {
    pub fn spawn<S>(&self, analytics: AnalyticsService<S>, sink: Arc<dyn GaugeSink>) -> RefresherHandle
    where
        S: ShopStore + ?Sized + 'static,
    {
        let (tx, mut rx) = oneshot::channel::<()>();
        let trigger = Arc::new(Notify::new());
        let wake = Arc::clone(&trigger);
        let interval = self.interval;

        let join = tokio::spawn(async move {
            info!(
                runner = "business_metrics",
                interval_secs = interval.as_secs(),
                "metrics refresher started"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut rx => break,
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {}
                }
                refresh_once(&analytics, sink.as_ref()).await;
            }
            info!(runner = "business_metrics", "metrics refresher stopped");
        });

        RefresherHandle {
            shutdown: Some(tx),
            trigger,
            join: Some(join),
        }
    }
}

/// One refresh cycle. Returns whether the gauges were updated.
pub async fn refresh_once<S>(analytics: &AnalyticsService<S>, sink: &dyn GaugeSink) -> bool
where
    S: ShopStore + ?Sized,
{
    match analytics.business_metrics().await {
        Ok(metrics) => {
            metrics.publish(sink);
            debug!(
                pending = metrics.pending_orders,
                in_progress = metrics.in_progress_orders,
                "business metrics refreshed"
            );
            true
        }
        Err(e) => {
            warn!(error = %e, "business metrics refresh failed");
            false
        }
    }
}
