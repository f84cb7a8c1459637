//! Business gauges pushed on every refresh cycle.

use serde::Serialize;

use autoshop_core::{GaugeSink, Money, to_f64};

use crate::dashboard::DashboardSnapshot;

pub const PENDING_ORDERS: &str = "pending_orders";
pub const IN_PROGRESS_ORDERS: &str = "in_progress_orders";
pub const TOTAL_CLIENTS: &str = "total_clients";
pub const TOTAL_VEHICLES: &str = "total_vehicles";
pub const ACTIVE_EMPLOYEES: &str = "active_employees";
pub const DAILY_REVENUE: &str = "daily_revenue";

/// Every gauge name, for sinks that pre-register.
pub const GAUGES: [&str; 6] = [
    PENDING_ORDERS,
    IN_PROGRESS_ORDERS,
    TOTAL_CLIENTS,
    TOTAL_VEHICLES,
    ACTIVE_EMPLOYEES,
    DAILY_REVENUE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusinessMetrics {
    pub pending_orders: u64,
    pub in_progress_orders: u64,
    pub total_clients: u64,
    pub total_vehicles: u64,
    pub active_employees: u64,
    pub daily_revenue: Money,
}

impl BusinessMetrics {
    pub fn from_snapshot(s: &DashboardSnapshot) -> Self {
        Self {
            pending_orders: s.orders.by_state.pending,
            in_progress_orders: s.orders.by_state.in_progress,
            total_clients: s.clients,
            total_vehicles: s.vehicles,
            active_employees: s.active_employees,
            daily_revenue: s.revenue_today,
        }
    }

    pub fn publish(&self, sink: &dyn GaugeSink) {
        sink.set_gauge(PENDING_ORDERS, self.pending_orders as f64);
        sink.set_gauge(IN_PROGRESS_ORDERS, self.in_progress_orders as f64);
        sink.set_gauge(TOTAL_CLIENTS, self.total_clients as f64);
        sink.set_gauge(TOTAL_VEHICLES, self.total_vehicles as f64);
        sink.set_gauge(ACTIVE_EMPLOYEES, self.active_employees as f64);
        sink.set_gauge(DAILY_REVENUE, to_f64(self.daily_revenue));
    }
}
