use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use autoshop_core::{DomainError, DomainResult, Entity, Money, ServiceId, optional_text, required_text};

use crate::contains_ci;

/// A billable catalog entry (labor or package).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    /// Unique case-insensitively.
    pub name: String,
    pub description: Option<String>,
    /// Current unit price; line items snapshot it when created.
    pub price: Money,
    pub estimated_minutes: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Service {
    type Id = ServiceId;

    fn id(&self) -> ServiceId {
        self.id
    }
}

impl Service {
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Inactive services cannot be put on orders.
    pub fn ensure_billable(&self) -> DomainResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(DomainError::precondition(format!(
                "service '{}' is inactive",
                self.name
            )))
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        contains_ci(&self.name, &q)
            || self.description.as_deref().is_some_and(|d| contains_ci(d, &q))
    }
}

/// Largest accepted unit price: ten digits before the point, two after.
pub const MAX_PRICE: Money = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn validate_price(price: Money) -> DomainResult<Money> {
    if price <= Decimal::ZERO {
        return Err(DomainError::invalid("price must be greater than zero"));
    }
    if price > MAX_PRICE {
        return Err(DomainError::invalid(format!("price must not exceed {MAX_PRICE}")));
    }
    if price.normalize().scale() > 2 {
        return Err(DomainError::invalid("price must have at most two decimal places"));
    }
    Ok(price)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub estimated_minutes: Option<u32>,
}

impl NewService {
    pub fn into_service(self, id: ServiceId, now: DateTime<Utc>) -> DomainResult<Service> {
        Ok(Service {
            id,
            name: required_text("name", &self.name)?,
            description: optional_text(self.description.as_deref()),
            price: validate_price(self.price)?,
            estimated_minutes: self.estimated_minutes,
            active: true,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub estimated_minutes: Option<u32>,
    pub active: Option<bool>,
}

impl ServicePatch {
    /// Price changes never touch existing line items (they hold a snapshot).
    pub fn apply(&self, service: &mut Service) -> DomainResult<()> {
        if let Some(name) = &self.name {
            service.name = required_text("name", name)?;
        }
        if let Some(description) = &self.description {
            service.description = optional_text(Some(description));
        }
        if let Some(price) = self.price {
            service.price = validate_price(price)?;
        }
        if let Some(minutes) = self.estimated_minutes {
            service.estimated_minutes = Some(minutes);
        }
        if let Some(active) = self.active {
            service.active = active;
        }
        Ok(())
    }
}
