use axum::{Router, routing::get};

pub mod clients;
pub mod dashboard;
pub mod employees;
pub mod invoices;
pub mod orders;
pub mod service_catalog;
pub mod system;
pub mod vehicles;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/clients", clients::router())
        .nest("/vehicles", vehicles::router())
        .nest("/employees", employees::router())
        .nest("/services", service_catalog::router())
        .nest("/orders", orders::router())
        .nest("/invoices", invoices::router())
        .nest("/dashboard", dashboard::router())
}
