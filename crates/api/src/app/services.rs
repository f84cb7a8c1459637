//! Service wiring: one store, four application services, one metrics registry.
//!
//! The backend is chosen at startup (`USE_PERSISTENT_STORES`); handlers only
//! ever see `dyn ShopStore`.

use std::sync::Arc;

use thiserror::Error;

use autoshop_analytics::LocalCalendar;
use autoshop_core::{Clock, SystemClock};
use autoshop_infra::services::{AnalyticsService, CatalogService, InvoiceService, OrderService};
use autoshop_infra::store::{InMemoryShopStore, PostgresShopStore, ShopStore, StoreError};
use autoshop_infra::{BusinessMetricsRefresher, RefresherHandle};
use autoshop_observability::{MetricsError, ShopMetrics};
use autoshop_orders::TransitionPolicy;

use crate::config::{AppConfig, Persistence};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

pub struct AppServices {
    pub catalog: CatalogService<dyn ShopStore>,
    pub orders: OrderService<dyn ShopStore>,
    pub invoices: InvoiceService<dyn ShopStore>,
    pub analytics: AnalyticsService<dyn ShopStore>,
    pub metrics: Arc<ShopMetrics>,
    backend: &'static str,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn ShopStore>,
        backend: &'static str,
        clock: Arc<dyn Clock>,
        calendar: LocalCalendar,
        policy: TransitionPolicy,
        metrics: Arc<ShopMetrics>,
    ) -> Self {
        Self {
            catalog: CatalogService::new(Arc::clone(&store), Arc::clone(&clock)),
            orders: OrderService::new(Arc::clone(&store), Arc::clone(&clock), policy),
            invoices: InvoiceService::new(Arc::clone(&store), Arc::clone(&clock)),
            analytics: AnalyticsService::new(store, clock, calendar),
            metrics,
            backend,
        }
    }

    /// Empty in-memory shop on the wall clock, UTC calendar, permissive policy.
    pub fn in_memory() -> Result<Self, StartupError> {
        Ok(Self::new(
            Arc::new(InMemoryShopStore::new()),
            "in_memory",
            Arc::new(SystemClock),
            LocalCalendar::utc(),
            TransitionPolicy::Permissive,
            Arc::new(ShopMetrics::new()?),
        ))
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let (store, backend): (Arc<dyn ShopStore>, &'static str) = match &config.persistence {
            Persistence::InMemory => (Arc::new(InMemoryShopStore::new()), "in_memory"),
            Persistence::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresShopStore::connect(database_url, *max_connections).await?;
                store.migrate().await?;
                (Arc::new(store), "postgres")
            }
        };
        tracing::info!(backend, policy = ?config.transition_policy, "shop store ready");

        Ok(Self::new(
            store,
            backend,
            Arc::new(SystemClock),
            config.calendar,
            config.transition_policy,
            Arc::new(ShopMetrics::new()?),
        ))
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Start pushing business gauges into this process's registry.
    pub fn start_refresher(&self, refresher: BusinessMetricsRefresher) -> RefresherHandle {
        let sink = Arc::clone(&self.metrics);
        refresher.spawn(self.analytics.clone(), sink)
    }
}
