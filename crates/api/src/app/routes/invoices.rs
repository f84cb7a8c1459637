//! `/invoices`: issue, amend and report.
//!
//! Amounts are stored at full precision and rounded to cents on the way out.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use autoshop_core::{InvoiceId, OrderId};
use autoshop_invoicing::{Invoice, InvoicePatch, NewInvoice};

use crate::app::dto::{self, DateRangeParams, InvoiceParams, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/summary", get(sales_summary))
        .route("/period", get(sales_for_period))
        .route("/order/:order_id", get(invoice_for_order))
        .route("/:id", get(get_invoice).patch(update_invoice).delete(delete_invoice))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewInvoice>,
) -> ApiResult<impl IntoResponse> {
    let invoice = services.invoices.create_invoice(principal.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(invoice.presented())))
}

/// Newest first. `from`/`to` are inclusive local dates.
pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<InvoiceParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query(&services.analytics.calendar())?;
    let invoices = services.invoices.list_invoices(&query).await?;
    Ok(Json(Items::from(
        invoices.into_iter().map(Invoice::presented).collect::<Vec<_>>(),
    )))
}

pub async fn sales_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<DateRangeParams>,
) -> ApiResult<impl IntoResponse> {
    let issued = params.range(&services.analytics.calendar())?;
    Ok(Json(services.invoices.sales_summary(issued).await?))
}

pub async fn sales_for_period(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<DateRangeParams>,
) -> ApiResult<impl IntoResponse> {
    let range = params.required(&services.analytics.calendar())?;
    Ok(Json(services.invoices.sales_for_period(range).await?))
}

pub async fn invoice_for_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order_id: OrderId = dto::parse_id(&order_id)?;
    let invoice = services.invoices.invoice_for_order(order_id).await?;
    Ok(Json(invoice.presented()))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    Ok(Json(services.invoices.get_invoice(id).await?.presented()))
}

/// Only `payment_method` can change.
pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<InvoicePatch>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = services.invoices.update_invoice(principal.principal(), id, body).await?;
    Ok(Json(invoice.presented()))
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: InvoiceId = dto::parse_id(&id)?;
    services.invoices.delete_invoice(principal.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
