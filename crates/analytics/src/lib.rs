//! `autoshop-analytics`: read-only derivations over shop data.
//!
//! Everything here is a fold or a pure function; the infra layer feeds it rows
//! (usually from a stream) and hands the results to the dashboard.

pub mod calendar;
pub mod dashboard;
pub mod metrics;
pub mod ranking;
pub mod revenue;

pub use calendar::{LocalCalendar, YearMonth};
pub use dashboard::{DashboardSnapshot, EntityCounts, OrderOverview, StateShare, state_distribution};
pub use metrics::BusinessMetrics;
pub use ranking::{EmployeeRank, EmployeeStats, RankBy, ServiceRank, ServiceRanking, top_employees};
pub use revenue::{MonthlyRevenue, MonthlyRevenuePoint, PeriodComparison, RevenueTotals, Trend};

/// Default limit for top-N service lists.
pub const DEFAULT_TOP_SERVICES: usize = 5;
/// Default limit for top-N employee lists.
pub const DEFAULT_TOP_EMPLOYEES: usize = 5;
/// Default limit for "recent" lists.
pub const DEFAULT_RECENT: usize = 10;
/// Months covered by the revenue series.
pub const REVENUE_SERIES_MONTHS: u32 = 12;
