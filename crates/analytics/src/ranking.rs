//! Top-N rankings of services and employees.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use autoshop_catalog::{Employee, Service};
use autoshop_core::{EmployeeId, Money, ServiceId, present};
use autoshop_orders::{LineItem, StateCounts};

/// What a service ranking sorts on. Ties always fall back to first appearance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankBy {
    /// Units sold.
    #[default]
    Quantity,
    Revenue,
    /// Number of line items, then units sold.
    LineCount,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    first_seen: usize,
    quantity: u64,
    revenue: Money,
    line_count: u64,
}

/// Line items grouped by service, in the order they are fed.
#[derive(Debug, Clone, Default)]
pub struct ServiceRanking {
    seen: usize,
    tallies: HashMap<ServiceId, Tally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRank {
    pub service_id: ServiceId,
    pub name: String,
    pub price: Money,
    pub quantity_sold: u64,
    pub revenue: Money,
    pub line_count: u64,
}

impl ServiceRanking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed lines in creation order; that order decides ties.
    pub fn record(&mut self, line: &LineItem) {
        let seen = self.seen;
        let t = self.tallies.entry(line.service_id).or_insert(Tally {
            first_seen: seen,
            quantity: 0,
            revenue: Money::ZERO,
            line_count: 0,
        });
        t.quantity += u64::from(line.quantity);
        t.revenue += line.subtotal;
        t.line_count += 1;
        self.seen += 1;
    }

    /// The `n` best services by `by`. Services missing from `catalog` are skipped.
    pub fn top(self, n: usize, by: RankBy, catalog: &[Service]) -> Vec<ServiceRank> {
        let lookup: HashMap<ServiceId, &Service> = catalog.iter().map(|s| (s.id, s)).collect();

        let mut ranked: Vec<(ServiceId, Tally)> = self.tallies.into_iter().collect();
        ranked.sort_by(|(_, a), (_, b)| rank_order(by, a, b).then(a.first_seen.cmp(&b.first_seen)));

        ranked
            .into_iter()
            .filter_map(|(id, t)| {
                lookup.get(&id).map(|s| ServiceRank {
                    service_id: id,
                    name: s.name.clone(),
                    price: s.price,
                    quantity_sold: t.quantity,
                    revenue: present(t.revenue),
                    line_count: t.line_count,
                })
            })
            .take(n)
            .collect()
    }
}

fn rank_order(by: RankBy, a: &Tally, b: &Tally) -> Ordering {
    match by {
        RankBy::Quantity => b.quantity.cmp(&a.quantity),
        RankBy::Revenue => b.revenue.cmp(&a.revenue),
        RankBy::LineCount => b
            .line_count
            .cmp(&a.line_count)
            .then(b.quantity.cmp(&a.quantity)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeRank {
    pub employee_id: EmployeeId,
    pub name: String,
    pub specialty: Option<String>,
    pub completed_orders: u64,
}

/// Active employees ranked by completed orders, best first.
///
/// Employees with no completions are kept (with zero) and rank last; ties go
/// by name, case-insensitively.
pub fn top_employees(
    employees: &[Employee],
    completed: &HashMap<EmployeeId, u64>,
    n: usize,
) -> Vec<EmployeeRank> {
    let mut ranked: Vec<EmployeeRank> = employees
        .iter()
        .filter(|e| e.active)
        .map(|e| EmployeeRank {
            employee_id: e.id,
            name: e.name.clone(),
            specialty: e.specialty.clone(),
            completed_orders: completed.get(&e.id).copied().unwrap_or(0),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.completed_orders
            .cmp(&a.completed_orders)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.employee_id.as_uuid().cmp(b.employee_id.as_uuid()))
    });
    ranked.truncate(n);
    ranked
}

/// Order workload of one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeStats {
    pub employee_id: EmployeeId,
    pub name: String,
    pub total_orders: u64,
    pub by_state: StateCounts,
}

impl EmployeeStats {
    pub fn new(employee: &Employee, by_state: StateCounts) -> Self {
        Self {
            employee_id: employee.id,
            name: employee.name.clone(),
            total_orders: by_state.total(),
            by_state,
        }
    }
}
