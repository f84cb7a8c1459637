use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use autoshop_core::{
    DomainError, DomainResult, Entity, InvoiceId, Money, OrderId, optional_text, present,
};
use autoshop_orders::{LineItem, Order};

/// Flat sales tax applied to every invoice (12%).
pub const TAX_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);

pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

/// Financial settlement for one order.
///
/// Amounts are stored at full precision; only the payment method can change
/// after issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Unique: an order is invoiced at most once.
    pub order_id: OrderId,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub payment_method: String,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Amounts rounded to cents, for output.
    pub fn presented(self) -> Self {
        Self {
            subtotal: present(self.subtotal),
            tax: present(self.tax),
            total: present(self.total),
            ..self
        }
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> InvoiceId {
        self.id
    }
}

/// Totals derived from a set of line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceTotals {
    /// Fails with `InvalidInput` when the amounts leave `Decimal`'s range.
    pub fn compute<'a>(lines: impl IntoIterator<Item = &'a LineItem>) -> DomainResult<Self> {
        let out_of_range = || DomainError::invalid("invoice amount is out of range");
        let subtotal = lines
            .into_iter()
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.subtotal))
            .ok_or_else(out_of_range)?;
        let tax = subtotal.checked_mul(TAX_RATE).ok_or_else(out_of_range)?;
        let total = subtotal.checked_add(tax).ok_or_else(out_of_range)?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub payment_method: Option<String>,
}

/// Build the invoice for `order`.
///
/// The caller has resolved the order and its lines. Whether the order already
/// carries an invoice is the store's call (unique on `order_id`); this only
/// checks what the order itself can tell.
pub fn issue_invoice(
    order: &Order,
    lines: &[LineItem],
    payment_method: Option<&str>,
    id: InvoiceId,
    now: DateTime<Utc>,
) -> DomainResult<Invoice> {
    if !order.state.is_billable() {
        return Err(DomainError::precondition(format!(
            "order {} is {} and cannot be invoiced until completed or delivered",
            order.id, order.state
        )));
    }
    if lines.iter().any(|l| l.order_id != order.id) {
        return Err(DomainError::invalid("line items belong to a different order"));
    }

    let totals = InvoiceTotals::compute(lines)?;
    Ok(Invoice {
        id,
        order_id: order.id,
        subtotal: totals.subtotal,
        tax: totals.tax,
        total: totals.total,
        payment_method: optional_text(payment_method)
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
        issued_at: now,
    })
}

/// Only the payment method is amendable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePatch {
    pub payment_method: Option<String>,
}

impl InvoicePatch {
    pub fn apply(&self, invoice: &mut Invoice) -> DomainResult<()> {
        if let Some(method) = &self.payment_method {
            invoice.payment_method = optional_text(Some(method))
                .ok_or_else(|| DomainError::invalid("payment method must not be blank"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_catalog::{NewService, Service};
    use autoshop_core::{ServiceId, VehicleId, present};
    use autoshop_orders::{NewOrder, OrderState, RequestedService, plan_order};
    use proptest::prelude::*;

    fn service(cents: i64) -> Service {
        NewService {
            name: "Oil Change".into(),
            description: None,
            price: Decimal::new(cents, 2),
            estimated_minutes: None,
        }
        .into_service(ServiceId::new(), Utc::now())
        .unwrap()
    }

    fn order_with(service: &Service, quantity: u32) -> (Order, Vec<LineItem>) {
        let input = NewOrder {
            vehicle_id: VehicleId::new(),
            employee_id: None,
            services: vec![RequestedService {
                service_id: service.id,
                quantity: Some(quantity),
            }],
            mileage: None,
            notes: None,
        };
        plan_order(input, None, std::slice::from_ref(service), OrderId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn oil_change_times_two_bills_forty_four_eighty() {
        let (mut order, lines) = order_with(&service(2000), 2);
        order.state = OrderState::Completed;

        let invoice = issue_invoice(&order, &lines, None, InvoiceId::new(), Utc::now()).unwrap();

        assert_eq!(present(invoice.subtotal), Decimal::new(4000, 2));
        assert_eq!(present(invoice.tax), Decimal::new(480, 2));
        assert_eq!(present(invoice.total), Decimal::new(4480, 2));
        assert_eq!(invoice.payment_method, "cash");
    }

    #[test]
    fn overflowing_totals_are_invalid_input() {
        let (mut order, mut lines) = order_with(&service(2000), 1);
        order.state = OrderState::Completed;
        lines[0].subtotal = Decimal::MAX;
        lines.push(lines[0].clone());

        assert!(matches!(
            InvoiceTotals::compute(&lines),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            issue_invoice(&order, &lines, None, InvoiceId::new(), Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));

        // A single maximal line still overflows once tax is added.
        lines.truncate(1);
        assert!(InvoiceTotals::compute(&lines).is_err());
    }

    #[test]
    fn open_orders_are_not_billable() {
        let (mut order, lines) = order_with(&service(2000), 1);
        for state in [OrderState::Pending, OrderState::InProgress] {
            order.state = state;
            assert!(matches!(
                issue_invoice(&order, &lines, None, InvoiceId::new(), Utc::now()),
                Err(DomainError::PreconditionFailed(_))
            ));
        }
        order.state = OrderState::Delivered;
        assert!(issue_invoice(&order, &lines, None, InvoiceId::new(), Utc::now()).is_ok());
    }

    #[test]
    fn payment_method_is_trimmed_and_blank_defaults_to_cash() {
        let (mut order, lines) = order_with(&service(2000), 1);
        order.state = OrderState::Completed;
        let inv = issue_invoice(&order, &lines, Some("  card "), InvoiceId::new(), Utc::now()).unwrap();
        assert_eq!(inv.payment_method, "card");
        let inv = issue_invoice(&order, &lines, Some("   "), InvoiceId::new(), Utc::now()).unwrap();
        assert_eq!(inv.payment_method, "cash");
    }

    #[test]
    fn patch_changes_only_payment_method() {
        let (mut order, lines) = order_with(&service(2000), 1);
        order.state = OrderState::Completed;
        let mut inv = issue_invoice(&order, &lines, None, InvoiceId::new(), Utc::now()).unwrap();
        let before = inv.clone();

        InvoicePatch {
            payment_method: Some("transfer".into()),
        }
        .apply(&mut inv)
        .unwrap();
        assert_eq!(inv.payment_method, "transfer");
        assert_eq!((inv.subtotal, inv.tax, inv.total), (before.subtotal, before.tax, before.total));

        assert!(
            InvoicePatch {
                payment_method: Some(" ".into())
            }
            .apply(&mut inv)
            .is_err()
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: total = subtotal + 12% of subtotal, and recomputing from the
        /// same lines is identical.
        #[test]
        fn totals_are_deterministic_and_consistent(
            items in prop::collection::vec((1i64..100_000i64, 1u32..20u32), 1..12)
        ) {
            let order_id = OrderId::new();
            let lines: Vec<LineItem> = items
                .iter()
                .map(|(cents, qty)| {
                    let mut s = service(*cents);
                    s.id = ServiceId::new();
                    LineItem::snapshot(order_id, &s, Some(*qty), Utc::now()).unwrap()
                })
                .collect();

            let a = InvoiceTotals::compute(&lines).unwrap();
            let b = InvoiceTotals::compute(&lines).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.total, a.subtotal + a.subtotal * Decimal::new(12, 2));
            prop_assert_eq!(present(a.total), present(a.subtotal + a.tax));
        }
    }
}
