use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use autoshop_catalog::{ClientPatch, NewClient};
use autoshop_core::ClientId;
use autoshop_infra::store::CatalogQuery;

use crate::app::dto::{self, CatalogParams, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/:id", get(get_client).patch(update_client).delete(delete_client))
        .route("/:id/vehicles", get(client_vehicles))
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewClient>,
) -> ApiResult<impl IntoResponse> {
    let client = services.catalog.create_client(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// `?search=` matches name, phone or email.
pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<impl IntoResponse> {
    let clients = services.catalog.list_clients(&params.into()).await?;
    Ok(Json(Items::from(clients)))
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ClientId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.get_client(id).await?))
}

pub async fn client_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ClientId = dto::parse_id(&id)?;
    // 404 for an unknown client rather than an empty list
    services.catalog.get_client(id).await?;
    let vehicles = services
        .catalog
        .list_vehicles(&CatalogQuery {
            client_id: Some(id),
            ..Default::default()
        })
        .await?;
    Ok(Json(Items::from(vehicles)))
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ClientPatch>,
) -> ApiResult<impl IntoResponse> {
    let id: ClientId = dto::parse_id(&id)?;
    Ok(Json(services.catalog.update_client(principal.principal(), id, body).await?))
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: ClientId = dto::parse_id(&id)?;
    services.catalog.delete_client(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
