use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use autoshop_catalog::{EmployeePatch, NewEmployee};
use autoshop_core::EmployeeId;

use crate::app::dto::{self, CatalogParams, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route("/stats", get(all_employee_stats))
        .route("/:id", get(get_employee).patch(update_employee).delete(delete_employee))
        .route("/:id/toggle", post(toggle_employee))
        .route("/:id/stats", get(employee_stats))
}

pub async fn create_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewEmployee>,
) -> ApiResult<impl IntoResponse> {
    let employee = services.catalog.create_employee(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// Ordered by name. `?active=true` for assignable employees only.
pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<impl IntoResponse> {
    let employees = services.catalog.list_employees(&params.into()).await?;
    Ok(Json(Items::from(employees)))
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: EmployeeId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.get_employee(id).await?))
}

pub async fn update_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<EmployeePatch>,
) -> ApiResult<impl IntoResponse> {
    let id: EmployeeId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.update_employee(principal.principal(), id, body).await?))
}

pub async fn toggle_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: EmployeeId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.toggle_employee(principal.principal(), id).await?))
}

pub async fn delete_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: EmployeeId = dto::parse_id(&id)?;
    services.catalog.delete_employee(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn employee_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: EmployeeId = dto::parse_id(&id)?;
    Ok(Json(services.analytics.employee_stats(id).await?))
}

pub async fn all_employee_stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(Items::from(services.analytics.all_employee_stats().await?)))
}
