use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::app::errors::json_error;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "backend": services.backend() }))
}

/// Prometheus text exposition.
pub async fn metrics(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render metrics");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "metrics unavailable")
        }
    }
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({
        "principal_id": principal.principal_id(),
        "roles": principal.roles(),
        "permissions": principal.principal().permissions,
    }))
}
