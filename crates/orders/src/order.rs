use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autoshop_catalog::{Employee, Service};
use autoshop_core::{
    DomainError, DomainResult, EmployeeId, Entity, OrderId, ServiceId, VehicleId, optional_text,
};

use crate::line_item::LineItem;
use crate::state::{OrderState, TransitionPolicy};

/// A repair order for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub vehicle_id: VehicleId,
    pub employee_id: Option<EmployeeId>,
    pub state: OrderState,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub mileage: Option<u32>,
    pub notes: Option<String>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

impl Order {
    pub fn ensure_accepts_line_items(&self) -> DomainResult<()> {
        if self.state.accepts_line_items() {
            Ok(())
        } else {
            Err(DomainError::precondition(format!(
                "order {} is {} and no longer accepts line items",
                self.id, self.state
            )))
        }
    }
}

/// One requested service on order intake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestedService {
    pub service_id: ServiceId,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub vehicle_id: VehicleId,
    pub employee_id: Option<EmployeeId>,
    pub services: Vec<RequestedService>,
    pub mileage: Option<u32>,
    pub notes: Option<String>,
}

impl NewOrder {
    /// Distinct requested service ids, rejecting an empty or repeated list.
    pub fn service_ids(&self) -> DomainResult<Vec<ServiceId>> {
        if self.services.is_empty() {
            return Err(DomainError::invalid("an order needs at least one service"));
        }
        let mut seen = HashSet::with_capacity(self.services.len());
        for req in &self.services {
            if !seen.insert(req.service_id) {
                return Err(DomainError::invalid(format!(
                    "service {} is listed more than once",
                    req.service_id
                )));
            }
        }
        Ok(self.services.iter().map(|r| r.service_id).collect())
    }
}

/// Build the order and its line items from already-resolved references.
///
/// `employee` must be the resolved `input.employee_id` (if any), and
/// `services` whatever the store returned for [`NewOrder::service_ids`]. Every
/// requested service must be present and active; a partial match is an error.
pub fn plan_order(
    input: NewOrder,
    employee: Option<&Employee>,
    services: &[Service],
    id: OrderId,
    now: DateTime<Utc>,
) -> DomainResult<(Order, Vec<LineItem>)> {
    input.service_ids()?;

    if let Some(e) = employee {
        e.ensure_assignable()?;
    }

    let mut lines = Vec::with_capacity(input.services.len());
    for req in &input.services {
        let service = services
            .iter()
            .find(|s| s.id == req.service_id)
            .ok_or_else(|| DomainError::not_found(format!("service {}", req.service_id)))?;
        lines.push(LineItem::snapshot(id, service, req.quantity, now)?);
    }

    let order = Order {
        id,
        vehicle_id: input.vehicle_id,
        employee_id: employee.map(|e| e.id),
        state: OrderState::Pending,
        entered_at: now,
        exited_at: None,
        mileage: input.mileage,
        notes: optional_text(input.notes.as_deref()),
    };
    Ok((order, lines))
}

/// Partial order update. `state` arrives as text and is parsed strictly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub employee_id: Option<EmployeeId>,
    pub notes: Option<String>,
    pub state: Option<String>,
    pub mileage: Option<u32>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// Parsed target state, if any.
    pub fn target_state(&self) -> DomainResult<Option<OrderState>> {
        self.state.as_deref().map(str::parse).transpose()
    }

    /// `employee` must be the resolved `self.employee_id` when one is given.
    pub fn apply(
        &self,
        order: &mut Order,
        employee: Option<&Employee>,
        policy: TransitionPolicy,
    ) -> DomainResult<()> {
        if let Some(target) = self.target_state()? {
            policy.check(order.state, target)?;
            order.state = target;
        }
        if self.employee_id.is_some() {
            let e = employee.ok_or_else(|| DomainError::not_found("employee"))?;
            e.ensure_assignable()?;
            order.employee_id = Some(e.id);
        }
        if let Some(notes) = &self.notes {
            order.notes = optional_text(Some(notes));
        }
        if let Some(mileage) = self.mileage {
            order.mileage = Some(mileage);
        }
        if let Some(exited_at) = self.exited_at {
            if exited_at < order.entered_at {
                return Err(DomainError::invalid("exit date precedes entry date"));
            }
            order.exited_at = Some(exited_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_catalog::{NewEmployee, NewService};
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn service(name: &str, cents: i64) -> Service {
        NewService {
            name: name.into(),
            description: None,
            price: Decimal::new(cents, 2),
            estimated_minutes: None,
        }
        .into_service(ServiceId::new(), Utc::now())
        .unwrap()
    }

    fn employee() -> Employee {
        NewEmployee {
            name: "Luis".into(),
            ..Default::default()
        }
        .into_employee(EmployeeId::new(), Utc::now())
        .unwrap()
    }

    fn intake(services: &[&Service]) -> NewOrder {
        NewOrder {
            vehicle_id: VehicleId::new(),
            employee_id: None,
            services: services
                .iter()
                .map(|s| RequestedService {
                    service_id: s.id,
                    quantity: None,
                })
                .collect(),
            mileage: Some(42_000),
            notes: Some("  rattling noise  ".into()),
        }
    }

    #[test]
    fn plan_creates_pending_order_with_snapshotted_lines() {
        let oil = service("Oil Change", 2000);
        let mut input = intake(&[&oil]);
        input.services[0].quantity = Some(2);

        let (order, lines) = plan_order(input, None, &[oil.clone()], OrderId::new(), Utc::now()).unwrap();

        assert_eq!(order.state, OrderState::Pending);
        assert_eq!(order.notes.as_deref(), Some("rattling noise"));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].order_id, order.id);
        assert_eq!(lines[0].subtotal, Decimal::new(4000, 2));
    }

    #[test]
    fn plan_rejects_empty_and_duplicate_service_lists() {
        let oil = service("Oil Change", 2000);
        let empty = intake(&[]);
        assert!(matches!(
            plan_order(empty, None, &[], OrderId::new(), Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));

        let dup = intake(&[&oil, &oil]);
        assert!(matches!(
            plan_order(dup, None, &[oil.clone()], OrderId::new(), Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn plan_rejects_partial_match_and_inactive_services() {
        let oil = service("Oil Change", 2000);
        let mut brakes = service("Brakes", 8000);

        let input = intake(&[&oil, &brakes]);
        assert!(matches!(
            plan_order(input, None, &[oil.clone()], OrderId::new(), Utc::now()),
            Err(DomainError::NotFound(_))
        ));

        brakes.active = false;
        let input = intake(&[&oil, &brakes]);
        assert!(matches!(
            plan_order(input, None, &[oil.clone(), brakes.clone()], OrderId::new(), Utc::now()),
            Err(DomainError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn plan_rejects_inactive_employee() {
        let oil = service("Oil Change", 2000);
        let mut e = employee();
        e.active = false;
        let mut input = intake(&[&oil]);
        input.employee_id = Some(e.id);
        assert!(matches!(
            plan_order(input, Some(&e), &[oil.clone()], OrderId::new(), Utc::now()),
            Err(DomainError::PreconditionFailed(_))
        ));
    }

    fn pending_order() -> Order {
        let oil = service("Oil Change", 2000);
        plan_order(intake(&[&oil]), None, &[oil.clone()], OrderId::new(), Utc::now())
            .unwrap()
            .0
    }

    #[test]
    fn patch_rejects_unknown_state() {
        let mut order = pending_order();
        let patch = OrderPatch {
            state: Some("cancelled".into()),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply(&mut order, None, TransitionPolicy::Permissive),
            Err(DomainError::InvalidInput(_))
        ));
        assert_eq!(order.state, OrderState::Pending);
    }

    #[test]
    fn patch_honors_transition_policy() {
        let mut order = pending_order();
        order.state = OrderState::Completed;
        let back = OrderPatch {
            state: Some("pending".into()),
            ..Default::default()
        };
        assert!(back.apply(&mut order.clone(), None, TransitionPolicy::Forward).is_err());
        back.apply(&mut order, None, TransitionPolicy::Permissive).unwrap();
        assert_eq!(order.state, OrderState::Pending);
    }

    #[test]
    fn patch_assigns_active_employee_and_validates_exit_date() {
        let mut order = pending_order();
        let e = employee();
        OrderPatch {
            employee_id: Some(e.id),
            ..Default::default()
        }
        .apply(&mut order, Some(&e), TransitionPolicy::Permissive)
        .unwrap();
        assert_eq!(order.employee_id, Some(e.id));

        let early = OrderPatch {
            exited_at: Some(order.entered_at - Duration::hours(1)),
            ..Default::default()
        };
        assert!(early.apply(&mut order, None, TransitionPolicy::Permissive).is_err());
    }

    #[test]
    fn terminal_order_refuses_line_items() {
        let mut order = pending_order();
        assert!(order.ensure_accepts_line_items().is_ok());
        order.state = OrderState::Delivered;
        assert!(matches!(
            order.ensure_accepts_line_items(),
            Err(DomainError::PreconditionFailed(_))
        ));
    }
}
