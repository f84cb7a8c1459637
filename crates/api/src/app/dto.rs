//! Query-string DTOs and response envelopes.
//!
//! Request bodies deserialize straight into the domain input types
//! (`NewClient`, `OrderPatch`, ...); only query strings need a DTO here.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use autoshop_analytics::{DEFAULT_RECENT, DEFAULT_TOP_EMPLOYEES, DEFAULT_TOP_SERVICES, LocalCalendar, RankBy};
use autoshop_core::{ClientId, DomainError, EmployeeId, TimeRange, VehicleId};
use autoshop_infra::services::TopServicesQuery;
use autoshop_infra::store::{CatalogQuery, InvoiceQuery, OrderQuery};
use autoshop_orders::OrderState;

use crate::app::errors::{ApiError, ApiResult};

/// List responses are wrapped so fields can be added without breaking clients.
#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Items<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

pub fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(ApiError::from)
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub client_id: Option<ClientId>,
    pub limit: Option<usize>,
}

impl From<CatalogParams> for CatalogQuery {
    fn from(p: CatalogParams) -> Self {
        CatalogQuery {
            search: p.search,
            active: p.active,
            client_id: p.client_id,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub state: Option<String>,
    pub vehicle_id: Option<VehicleId>,
    pub employee_id: Option<EmployeeId>,
    pub limit: Option<usize>,
}

impl OrderParams {
    pub fn into_query(self) -> ApiResult<OrderQuery> {
        let state = self.state.as_deref().map(OrderState::from_str).transpose()?;
        Ok(OrderQuery {
            state,
            vehicle_id: self.vehicle_id,
            employee_id: self.employee_id,
            limit: self.limit,
        })
    }
}

/// Inclusive local dates; either both or neither.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRangeParams {
    pub fn range(&self, calendar: &LocalCalendar) -> ApiResult<Option<TimeRange>> {
        date_range(self.from, self.to, calendar)
    }

    pub fn required(&self, calendar: &LocalCalendar) -> ApiResult<TimeRange> {
        self.range(calendar)?
            .ok_or_else(|| ApiError::BadRequest("'from' and 'to' are required".into()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub limit: Option<usize>,
}

impl InvoiceParams {
    pub fn into_query(self, calendar: &LocalCalendar) -> ApiResult<InvoiceQuery> {
        Ok(InvoiceQuery {
            issued: date_range(self.from, self.to, calendar)?,
            payment_method: self.payment_method,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    pub fn recent(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RECENT)
    }

    pub fn top_employees(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_TOP_EMPLOYEES)
    }

    pub fn top_services(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_TOP_SERVICES)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopServicesParams {
    pub limit: Option<usize>,
    /// `quantity` (default), `revenue` or `line_count`.
    pub by: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TopServicesParams {
    /// Without dates the window is `default_window`.
    pub fn into_query(
        self,
        calendar: &LocalCalendar,
        default_window: TimeRange,
    ) -> ApiResult<TopServicesQuery> {
        let by = match self.by.as_deref().map(str::trim) {
            None | Some("quantity") => RankBy::Quantity,
            Some("revenue") => RankBy::Revenue,
            Some("line_count") => RankBy::LineCount,
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "unknown ranking '{other}'; expected quantity, revenue or line_count"
                )));
            }
        };
        let entered = date_range(self.from, self.to, calendar)?.unwrap_or(default_window);
        Ok(TopServicesQuery {
            limit: self.limit.unwrap_or(DEFAULT_TOP_SERVICES),
            by,
            entered: Some(entered),
        })
    }
}

fn date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    calendar: &LocalCalendar,
) -> ApiResult<Option<TimeRange>> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => Ok(Some(calendar.dates(from, to)?)),
        _ => Err(ApiError::BadRequest(
            "'from' and 'to' must be given together".into(),
        )),
    }
}
