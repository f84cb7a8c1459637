use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use autoshop_catalog::{NewVehicle, VehiclePatch};
use autoshop_core::VehicleId;

use crate::app::dto::{self, CatalogParams, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vehicles).post(create_vehicle))
        .route("/:id", get(get_vehicle).patch(update_vehicle).delete(delete_vehicle))
}

pub async fn create_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewVehicle>,
) -> ApiResult<impl IntoResponse> {
    let vehicle = services.catalog.create_vehicle(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// `?client_id=` narrows to one owner; `?search=` matches plate, make, model or VIN.
pub async fn list_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<impl IntoResponse> {
    let vehicles = services.catalog.list_vehicles(&params.into()).await?;
    Ok(Json(Items::from(vehicles)))
}

pub async fn get_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: VehicleId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.get_vehicle(id).await?))
}

pub async fn update_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<VehiclePatch>,
) -> ApiResult<impl IntoResponse> {
    let id: VehicleId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.update_vehicle(principal.principal(), id, body).await?))
}

pub async fn delete_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: VehicleId = dto::parse_id(&id)?;
    services.catalog.delete_vehicle(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
