use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use autoshop_auth::JwtValidator;
use autoshop_observability::ShopMetrics;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let unauthorized = |msg: &str| json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg);

    let token = extract_bearer(req.headers()).ok_or_else(|| unauthorized("missing bearer token"))?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        unauthorized("invalid or expired token")
    })?;

    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Request counter, latency histogram, 5xx counter and in-flight gauge.
///
/// Routes are labelled by their matched template (`/orders/:id`), never the
/// raw path.
pub async fn metrics_middleware(
    State(metrics): State<Arc<ShopMetrics>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let _in_flight = metrics.connection();
    let started = Instant::now();
    let method = req.method().as_str().to_owned();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(req).await;

    let status = response.status();
    metrics.record_request(&method, &route, status.as_u16(), started.elapsed());
    if status.is_server_error() {
        metrics.record_error(status.as_str());
    }
    response
}
