use serde::Serialize;

use autoshop_core::{Money, present};
use autoshop_orders::{OrderState, StateCounts};

/// Row counts the store can answer with grouped queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub clients: u64,
    pub vehicles: u64,
    pub active_employees: u64,
    pub active_services: u64,
    pub orders: StateCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderOverview {
    pub total: u64,
    #[serde(flatten)]
    pub by_state: StateCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub clients: u64,
    pub vehicles: u64,
    pub orders: OrderOverview,
    pub active_employees: u64,
    pub active_services: u64,
    pub revenue_today: Money,
    pub revenue_month: Money,
    pub invoices_month: u64,
}

impl DashboardSnapshot {
    pub fn assemble(
        counts: EntityCounts,
        revenue_today: Money,
        revenue_month: Money,
        invoices_month: u64,
    ) -> Self {
        Self {
            clients: counts.clients,
            vehicles: counts.vehicles,
            orders: OrderOverview {
                total: counts.orders.total(),
                by_state: counts.orders,
            },
            active_employees: counts.active_employees,
            active_services: counts.active_services,
            revenue_today: present(revenue_today),
            revenue_month: present(revenue_month),
            invoices_month,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateShare {
    pub state: OrderState,
    pub count: u64,
}

/// Exactly four entries, lifecycle order, zero-filled.
pub fn state_distribution(counts: &StateCounts) -> Vec<StateShare> {
    counts
        .entries()
        .into_iter()
        .map(|(state, count)| StateShare { state, count })
        .collect()
}
