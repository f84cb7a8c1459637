//! `/services`: the shop's catalog of billable work.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use autoshop_catalog::{NewService, ServicePatch};
use autoshop_core::ServiceId;

use crate::app::dto::{self, CatalogParams, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route("/:id", get(get_service).patch(update_service).delete(delete_service))
        .route("/:id/toggle", post(toggle_service))
}

pub async fn create_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewService>,
) -> ApiResult<impl IntoResponse> {
    let service = services.catalog.create_service(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<impl IntoResponse> {
    let list = services.catalog.list_services(&params.into()).await?;
    Ok(Json(Items::from(list)))
}

pub async fn get_service(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ServiceId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.get_service(id).await?))
}

pub async fn update_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ServicePatch>,
) -> ApiResult<impl IntoResponse> {
    let id: ServiceId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.update_service(principal.principal(), id, body).await?))
}

pub async fn toggle_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ServiceId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.toggle_service(principal.principal(), id).await?))
}

pub async fn delete_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: ServiceId = dto::parse_id(&id)?;
    services.catalog.delete_service(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
