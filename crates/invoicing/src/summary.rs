//! Sales roll-ups over issued invoices.
//!
//! Both views are plain folds so callers can feed them from a row stream
//! without materializing the whole invoice table.

use std::collections::BTreeMap;

use serde::Serialize;

use autoshop_core::{Money, present};

use crate::invoice::Invoice;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentMethodTotals {
    pub total: Money,
    pub count: u64,
}

/// Totals across invoices plus a per-payment-method breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub invoice_count: u64,
    pub total_sales: Money,
    pub total_tax: Money,
    pub total_subtotal: Money,
    pub by_payment_method: BTreeMap<String, PaymentMethodTotals>,
}

impl SalesSummary {
    pub fn record(&mut self, invoice: &Invoice) {
        self.invoice_count += 1;
        self.total_sales += invoice.total;
        self.total_tax += invoice.tax;
        self.total_subtotal += invoice.subtotal;
        let slot = self
            .by_payment_method
            .entry(invoice.payment_method.clone())
            .or_default();
        slot.total += invoice.total;
        slot.count += 1;
    }

    /// Same figures rounded to cents.
    pub fn presented(mut self) -> Self {
        self.total_sales = present(self.total_sales);
        self.total_tax = present(self.total_tax);
        self.total_subtotal = present(self.total_subtotal);
        for slot in self.by_payment_method.values_mut() {
            slot.total = present(slot.total);
        }
        self
    }
}

impl<'a> FromIterator<&'a Invoice> for SalesSummary {
    fn from_iter<I: IntoIterator<Item = &'a Invoice>>(iter: I) -> Self {
        let mut s = SalesSummary::default();
        for inv in iter {
            s.record(inv);
        }
        s
    }
}

/// Invoices issued inside a window, with their count and total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesForPeriod {
    pub invoice_count: u64,
    pub total_sales: Money,
    pub invoices: Vec<Invoice>,
}

impl SalesForPeriod {
    pub fn push(&mut self, invoice: Invoice) {
        self.invoice_count += 1;
        self.total_sales += invoice.total;
        self.invoices.push(invoice);
    }

    pub fn presented(self) -> Self {
        Self {
            total_sales: present(self.total_sales),
            invoices: self.invoices.into_iter().map(Invoice::presented).collect(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_core::{InvoiceId, OrderId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn invoice(subtotal_cents: i64, method: &str) -> Invoice {
        let subtotal = Decimal::new(subtotal_cents, 2);
        let tax = subtotal * crate::TAX_RATE;
        Invoice {
            id: InvoiceId::new(),
            order_id: OrderId::new(),
            subtotal,
            tax,
            total: subtotal + tax,
            payment_method: method.to_string(),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn summary_groups_by_payment_method() {
        let invoices = [
            invoice(4000, "cash"),
            invoice(1000, "card"),
            invoice(2000, "cash"),
        ];
        let summary: SalesSummary = invoices.iter().collect();
        let summary = summary.presented();

        assert_eq!(summary.invoice_count, 3);
        assert_eq!(summary.total_subtotal, Decimal::new(7000, 2));
        assert_eq!(summary.total_tax, Decimal::new(840, 2));
        assert_eq!(summary.total_sales, Decimal::new(7840, 2));

        let cash = summary.by_payment_method["cash"];
        assert_eq!(cash.count, 2);
        assert_eq!(cash.total, Decimal::new(6720, 2));
        assert_eq!(summary.by_payment_method["card"].count, 1);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary: SalesSummary = std::iter::empty::<&Invoice>().collect();
        assert_eq!(summary.invoice_count, 0);
        assert_eq!(summary.total_sales, Decimal::ZERO);
        assert!(summary.by_payment_method.is_empty());
    }

    #[test]
    fn period_accumulates_total() {
        let mut p = SalesForPeriod::default();
        p.push(invoice(1000, "cash"));
        p.push(invoice(1000, "card"));
        assert_eq!(p.invoice_count, 2);
        assert_eq!(p.presented().total_sales, Decimal::new(2240, 2));
    }
}
