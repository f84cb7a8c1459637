//! Read-side views for the dashboard.
//!
//! Counts come from grouped store queries; revenue and line-item aggregates
//! are folded over row streams, so memory is bounded by the number of buckets
//! rather than the number of rows.

use std::sync::Arc;

use futures::TryStreamExt;
use tracing::debug;

use autoshop_analytics::{
    BusinessMetrics, DEFAULT_TOP_SERVICES, DashboardSnapshot, EmployeeRank, EmployeeStats,
    LocalCalendar, MonthlyRevenue, MonthlyRevenuePoint, PeriodComparison, REVENUE_SERIES_MONTHS,
    RankBy, RevenueTotals, ServiceRank, ServiceRanking, StateShare, state_distribution, top_employees,
};
use autoshop_catalog::Client;
use autoshop_core::{Clock, EmployeeId, TimeRange};
use autoshop_invoicing::Invoice;
use autoshop_orders::Order;

use super::{ServiceResult, found};
use crate::store::{CatalogQuery, InvoiceQuery, OrderQuery, ShopStore};

/// Which line items feed a service ranking, and how to rank them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopServicesQuery {
    pub limit: usize,
    pub by: RankBy,
    /// Only lines on orders entered in this window; `None` for all time.
    pub entered: Option<TimeRange>,
}

impl Default for TopServicesQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_SERVICES,
            by: RankBy::Quantity,
            entered: None,
        }
    }
}

pub struct AnalyticsService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    calendar: LocalCalendar,
}

impl<S: ?Sized> Clone for AnalyticsService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            calendar: self.calendar,
        }
    }
}

impl<S> AnalyticsService<S>
where
    S: ShopStore + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, calendar: LocalCalendar) -> Self {
        Self {
            store,
            clock,
            calendar,
        }
    }

    pub fn calendar(&self) -> LocalCalendar {
        self.calendar
    }

    /// The local month containing now.
    pub fn current_month(&self) -> TimeRange {
        self.calendar.month(self.clock.now())
    }

    async fn revenue(&self, range: TimeRange) -> ServiceResult<RevenueTotals> {
        let totals = self
            .store
            .invoices_issued(range)
            .try_fold(RevenueTotals::default(), |mut acc, invoice| async move {
                acc.record(&invoice);
                Ok(acc)
            })
            .await?;
        Ok(totals)
    }

    pub async fn dashboard(&self) -> ServiceResult<DashboardSnapshot> {
        let now = self.clock.now();
        let counts = self.store.entity_counts().await?;
        let today = self.revenue(self.calendar.day(now)).await?;
        let month = self.revenue(self.calendar.month(now)).await?;
        debug!(
            orders = counts.orders.total(),
            invoices_month = month.invoice_count,
            "dashboard snapshot assembled"
        );
        Ok(DashboardSnapshot::assemble(
            counts,
            today.total,
            month.total,
            month.invoice_count,
        ))
    }

    pub async fn business_metrics(&self) -> ServiceResult<BusinessMetrics> {
        Ok(BusinessMetrics::from_snapshot(&self.dashboard().await?))
    }

    /// Trailing twelve months, ascending; months without invoices are absent.
    pub async fn monthly_revenue(&self) -> ServiceResult<Vec<MonthlyRevenuePoint>> {
        let window = self
            .calendar
            .trailing_months(self.clock.now(), REVENUE_SERIES_MONTHS);
        let series = self
            .store
            .invoices_issued(window)
            .try_fold(MonthlyRevenue::new(self.calendar), |mut acc, invoice| async move {
                acc.record(&invoice);
                Ok(acc)
            })
            .await?;
        Ok(series.into_series())
    }

    pub async fn state_distribution(&self) -> ServiceResult<Vec<StateShare>> {
        let counts = self.store.order_state_counts(None).await?;
        Ok(state_distribution(&counts))
    }

    pub async fn top_services(&self, query: TopServicesQuery) -> ServiceResult<Vec<ServiceRank>> {
        let ranking = self
            .store
            .line_item_stream(query.entered)
            .try_fold(ServiceRanking::new(), |mut acc, line| async move {
                acc.record(&line);
                Ok(acc)
            })
            .await?;
        let catalog = self.store.list_services(&CatalogQuery::default()).await?;
        Ok(ranking.top(query.limit, query.by, &catalog))
    }

    /// All-time services by how many line items reference them.
    pub async fn popular_services(&self, limit: usize) -> ServiceResult<Vec<ServiceRank>> {
        self.top_services(TopServicesQuery {
            limit,
            by: RankBy::LineCount,
            entered: None,
        })
        .await
    }

    /// Active employees by orders completed this month.
    pub async fn productive_employees(&self, limit: usize) -> ServiceResult<Vec<EmployeeRank>> {
        let employees = self
            .store
            .list_employees(&CatalogQuery {
                active: Some(true),
                ..Default::default()
            })
            .await?;
        let completed = self
            .store
            .completed_orders_by_employee(self.current_month())
            .await?;
        Ok(top_employees(&employees, &completed, limit))
    }

    /// This month against last month.
    pub async fn monthly_comparison(&self) -> ServiceResult<PeriodComparison> {
        let now = self.clock.now();
        let current = self.revenue(self.calendar.month(now)).await?;
        let previous = self.revenue(self.calendar.previous_month(now)).await?;
        Ok(PeriodComparison::between(current, previous))
    }

    pub async fn employee_stats(&self, id: EmployeeId) -> ServiceResult<EmployeeStats> {
        let employee = found(self.store.get_employee(id).await?, "employee", id)?;
        let counts = self.store.order_state_counts(Some(id)).await?;
        Ok(EmployeeStats::new(&employee, counts))
    }

    /// Stats for every employee, ordered by name.
    pub async fn all_employee_stats(&self) -> ServiceResult<Vec<EmployeeStats>> {
        let employees = self.store.list_employees(&CatalogQuery::default()).await?;
        let mut out = Vec::with_capacity(employees.len());
        for e in &employees {
            let counts = self.store.order_state_counts(Some(e.id)).await?;
            out.push(EmployeeStats::new(e, counts));
        }
        Ok(out)
    }

    pub async fn recent_orders(&self, limit: usize) -> ServiceResult<Vec<Order>> {
        Ok(self
            .store
            .list_orders(&OrderQuery {
                limit: Some(limit),
                ..Default::default()
            })
            .await?)
    }

    pub async fn recent_clients(&self, limit: usize) -> ServiceResult<Vec<Client>> {
        Ok(self
            .store
            .list_clients(&CatalogQuery {
                limit: Some(limit),
                ..Default::default()
            })
            .await?)
    }

    /// Latest invoices.
    pub async fn recent_activity(&self, limit: usize) -> ServiceResult<Vec<Invoice>> {
        Ok(self
            .store
            .list_invoices(&InvoiceQuery {
                limit: Some(limit),
                ..Default::default()
            })
            .await?)
    }
}
