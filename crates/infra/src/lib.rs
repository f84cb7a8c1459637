//! Infrastructure layer: stores, application services and background runners.

pub mod refresher;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use refresher::{BusinessMetricsRefresher, RefresherHandle};
pub use services::{
    AnalyticsService, CatalogService, InvoiceService, OrderService, ServiceError, ServiceResult,
};
pub use store::{InMemoryShopStore, PostgresShopStore, ShopStore, StoreError};
