//! Revenue folds over issued invoices.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use autoshop_core::{Money, present};
use autoshop_invoicing::Invoice;

use crate::calendar::{LocalCalendar, YearMonth};

/// Σ total and invoice count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevenueTotals {
    pub total: Money,
    pub invoice_count: u64,
}

impl RevenueTotals {
    pub fn record(&mut self, invoice: &Invoice) {
        self.total += invoice.total;
        self.invoice_count += 1;
    }

    pub fn presented(self) -> Self {
        Self {
            total: present(self.total),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenuePoint {
    pub month: YearMonth,
    pub total: Money,
    pub invoice_count: u64,
}

/// Revenue bucketed by local calendar month.
///
/// Sparse: months without invoices never get a bucket.
#[derive(Debug, Clone)]
pub struct MonthlyRevenue {
    calendar: LocalCalendar,
    buckets: BTreeMap<YearMonth, RevenueTotals>,
}

impl MonthlyRevenue {
    pub fn new(calendar: LocalCalendar) -> Self {
        Self {
            calendar,
            buckets: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, invoice: &Invoice) {
        let key = self.calendar.month_of(invoice.issued_at);
        self.buckets.entry(key).or_default().record(invoice);
    }

    /// Ascending by month, totals rounded to cents.
    pub fn into_series(self) -> Vec<MonthlyRevenuePoint> {
        self.buckets
            .into_iter()
            .map(|(month, t)| MonthlyRevenuePoint {
                month,
                total: present(t.total),
                invoice_count: t.invoice_count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Positive,
    Negative,
}

/// Current month against the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodComparison {
    pub current: RevenueTotals,
    pub previous: RevenueTotals,
    pub difference: Money,
    /// Percent change relative to `previous.total`; zero when that is zero.
    pub percent_change: Money,
    pub trend: Trend,
}

impl PeriodComparison {
    pub fn between(current: RevenueTotals, previous: RevenueTotals) -> Self {
        let difference = current.total - previous.total;
        let percent_change = if previous.total.is_zero() {
            Decimal::ZERO
        } else {
            difference / previous.total * Decimal::ONE_HUNDRED
        };
        Self {
            current: current.presented(),
            previous: previous.presented(),
            difference: present(difference),
            percent_change: present(percent_change),
            trend: if difference >= Decimal::ZERO {
                Trend::Positive
            } else {
                Trend::Negative
            },
        }
    }
}
