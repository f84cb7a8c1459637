//! `/dashboard`: read-only views for the shop's front page.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
};

use autoshop_invoicing::Invoice;

use crate::app::dto::{Items, LimitParams, TopServicesParams};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/business-metrics", get(business_metrics))
        .route("/recent-orders", get(recent_orders))
        .route("/recent-clients", get(recent_clients))
        .route("/recent-activity", get(recent_activity))
        .route("/monthly-revenue", get(monthly_revenue))
        .route("/monthly-comparison", get(monthly_comparison))
        .route("/state-distribution", get(state_distribution))
        .route("/top-services", get(top_services))
        .route("/popular-services", get(popular_services))
        .route("/productive-employees", get(productive_employees))
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.analytics.dashboard().await?))
}

pub async fn business_metrics(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.analytics.business_metrics().await?))
}

pub async fn recent_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(Items::from(services.analytics.recent_orders(params.recent()).await?)))
}

pub async fn recent_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(Items::from(services.analytics.recent_clients(params.recent()).await?)))
}

pub async fn recent_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    let invoices = services.analytics.recent_activity(params.recent()).await?;
    Ok(Json(Items::from(
        invoices.into_iter().map(Invoice::presented).collect::<Vec<_>>(),
    )))
}

/// Trailing twelve local months; months without invoices are omitted.
pub async fn monthly_revenue(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(Items::from(services.analytics.monthly_revenue().await?)))
}

pub async fn monthly_comparison(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.analytics.monthly_comparison().await?))
}

pub async fn state_distribution(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(Items::from(services.analytics.state_distribution().await?)))
}

/// Defaults to the current local month when no dates are given.
pub async fn top_services(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<TopServicesParams>,
) -> ApiResult<impl IntoResponse> {
    let analytics = &services.analytics;
    let query = params.into_query(&analytics.calendar(), analytics.current_month())?;
    Ok(Json(Items::from(analytics.top_services(query).await?)))
}

pub async fn popular_services(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    let ranked = services.analytics.popular_services(params.top_services()).await?;
    Ok(Json(Items::from(ranked)))
}

pub async fn productive_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    let ranked = services.analytics.productive_employees(params.top_employees()).await?;
    Ok(Json(Items::from(ranked)))
}
