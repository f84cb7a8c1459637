//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and application services
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: query-string DTOs and response envelopes
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>, jwt_secret: String) -> Router {
    let jwt = Arc::new(autoshop_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };
    let metrics = Arc::clone(&services.metrics);

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(Arc::clone(&services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .layer(Extension(services))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::metrics_middleware,
        )))
}
