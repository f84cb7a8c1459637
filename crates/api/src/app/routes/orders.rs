use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use autoshop_core::OrderId;
use autoshop_orders::{NewOrder, OrderPatch, RequestedService};

use crate::app::dto::{self, Items, OrderParams};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats", get(order_stats))
        .route("/:id", get(get_order).patch(update_order).delete(delete_order))
        .route("/:id/line-items", post(add_line_item))
}

/// Creates the order and its initial line items together.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewOrder>,
) -> ApiResult<impl IntoResponse> {
    let order = services.orders.create_order(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Newest first. Filters: `state`, `vehicle_id`, `employee_id`, `limit`.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<OrderParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query()?;
    Ok(Json(Items::from(services.orders.list_orders(&query).await?)))
}

pub async fn order_stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(services.orders.state_counts().await?))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: OrderId = dto::parse_id(&id)?;
    Ok(Json(services.orders.get_order(id).await?))
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<OrderPatch>,
) -> ApiResult<impl IntoResponse> {
    let id: OrderId = dto::parse_id(&id)?;
    Ok(Json(services.orders.update_order(principal.principal(), id, body).await?))
}

pub async fn add_line_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<RequestedService>,
) -> ApiResult<impl IntoResponse> {
    let id: OrderId = dto::parse_id(&id)?;
    let line = services.orders.add_line_item(principal.principal(), id, body).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: OrderId = dto::parse_id(&id)?;
    services.orders.delete_order(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
