use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use autoshop_catalog::Service;
use autoshop_core::{DomainError, DomainResult, Entity, LineItemId, Money, OrderId, ServiceId};

/// One billed service on an order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub service_id: ServiceId,
    pub quantity: u32,
    /// Service price at the moment the line was created.
    pub unit_price: Money,
    /// `quantity × unit_price`.
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> LineItemId {
        self.id
    }
}

impl LineItem {
    /// Snapshot `service`'s current price into a new line.
    ///
    /// `quantity` defaults to 1; zero is rejected. The service must be active.
    pub fn snapshot(
        order_id: OrderId,
        service: &Service,
        quantity: Option<u32>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        service.ensure_billable()?;
        let quantity = quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(DomainError::invalid("quantity must be at least 1"));
        }
        let subtotal = service
            .price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| DomainError::invalid("line subtotal is out of range"))?;
        Ok(Self {
            id: LineItemId::new(),
            order_id,
            service_id: service.id,
            quantity,
            unit_price: service.price,
            subtotal,
            created_at: now,
        })
    }
}
