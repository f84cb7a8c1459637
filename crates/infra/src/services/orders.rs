use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use autoshop_analytics::OrderOverview;
use autoshop_auth::{Permission, Principal};
use autoshop_core::{Clock, OrderId};
use autoshop_orders::{
    LineItem, NewOrder, Order, OrderPatch, RequestedService, TransitionPolicy, plan_order,
};

use super::{ServiceResult, found, require};
use crate::store::{OrderQuery, ShopStore};

/// An order with its line items in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub line_items: Vec<LineItem>,
}

/// Order intake, updates, line items and deletion.
pub struct OrderService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: TransitionPolicy,
}

impl<S: ?Sized> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S> OrderService<S>
where
    S: ShopStore + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: TransitionPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Resolve vehicle, employee and services, then write the order and its
    /// lines as one unit.
    pub async fn create_order(&self, actor: &Principal, input: NewOrder) -> ServiceResult<OrderDetails> {
        require(actor, &Permission::ORDERS_WRITE)?;

        let service_ids = input.service_ids()?;
        found(self.store.get_vehicle(input.vehicle_id).await?, "vehicle", input.vehicle_id)?;
        let employee = match input.employee_id {
            Some(id) => Some(found(self.store.get_employee(id).await?, "employee", id)?),
            None => None,
        };
        let services = self.store.get_services(&service_ids).await?;

        let (order, line_items) =
            plan_order(input, employee.as_ref(), &services, OrderId::new(), self.clock.now())?;
        self.store.insert_order(&order, &line_items).await?;

        info!(
            order_id = %order.id,
            vehicle_id = %order.vehicle_id,
            line_count = line_items.len(),
            actor = %actor.principal_id,
            "order created"
        );
        Ok(OrderDetails { order, line_items })
    }

    pub async fn get_order(&self, id: OrderId) -> ServiceResult<OrderDetails> {
        let order = found(self.store.get_order(id).await?, "order", id)?;
        let line_items = self.store.line_items(id).await?;
        Ok(OrderDetails { order, line_items })
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> ServiceResult<Vec<Order>> {
        debug!(state = ?query.state, "listing orders");
        Ok(self.store.list_orders(query).await?)
    }

    /// Total and per-state counts.
    pub async fn state_counts(&self) -> ServiceResult<OrderOverview> {
        let by_state = self.store.order_state_counts(None).await?;
        Ok(OrderOverview {
            total: by_state.total(),
            by_state,
        })
    }

    pub async fn update_order(
        &self,
        actor: &Principal,
        id: OrderId,
        patch: OrderPatch,
    ) -> ServiceResult<Order> {
        require(actor, &Permission::ORDERS_WRITE)?;

        let mut order = found(self.store.get_order(id).await?, "order", id)?;
        let employee = match patch.employee_id {
            Some(eid) => Some(found(self.store.get_employee(eid).await?, "employee", eid)?),
            None => None,
        };
        let from = order.state;
        patch.apply(&mut order, employee.as_ref(), self.policy)?;
        self.store.update_order(&order).await?;

        info!(
            order_id = %id,
            from = %from,
            to = %order.state,
            actor = %actor.principal_id,
            "order updated"
        );
        Ok(order)
    }

    /// Append one line at the service's current price.
    ///
    /// The store re-checks the order's state at insert time, so a concurrent
    /// completion still wins.
    pub async fn add_line_item(
        &self,
        actor: &Principal,
        order_id: OrderId,
        request: RequestedService,
    ) -> ServiceResult<LineItem> {
        require(actor, &Permission::ORDERS_WRITE)?;

        let order = found(self.store.get_order(order_id).await?, "order", order_id)?;
        order.ensure_accepts_line_items()?;
        let service = found(
            self.store.get_service(request.service_id).await?,
            "service",
            request.service_id,
        )?;

        let line = LineItem::snapshot(order_id, &service, request.quantity, self.clock.now())?;
        self.store.append_line_item(&line).await?;

        info!(
            order_id = %order_id,
            service_id = %line.service_id,
            quantity = line.quantity,
            actor = %actor.principal_id,
            "line item added"
        );
        Ok(line)
    }

    /// Refused while an invoice exists; line items go with the order.
    pub async fn delete_order(&self, actor: &Principal, id: OrderId) -> ServiceResult<()> {
        require(actor, &Permission::ORDERS_DELETE)?;
        self.store.delete_order(id).await?;
        info!(order_id = %id, actor = %actor.principal_id, "order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CatalogService, ServiceError};
    use crate::store::InMemoryShopStore;
    use autoshop_catalog::{NewClient, NewEmployee, NewService, NewVehicle, Service, Vehicle};
    use autoshop_core::{DomainError, FixedClock, ServiceId};
    use autoshop_orders::OrderState;
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct Shop {
        catalog: CatalogService<InMemoryShopStore>,
        orders: OrderService<InMemoryShopStore>,
        admin: Principal,
    }

    fn shop(policy: TransitionPolicy) -> Shop {
        let store = Arc::new(InMemoryShopStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        Shop {
            catalog: CatalogService::new(Arc::clone(&store), Arc::clone(&clock)),
            orders: OrderService::new(store, clock, policy),
            admin: Principal::system(),
        }
    }

    impl Shop {
        async fn vehicle(&self) -> Vehicle {
            let c = self
                .catalog
                .create_client(
                    &self.admin,
                    NewClient {
                        name: "Ines".into(),
                        phone: "777".into(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            self.catalog
                .create_vehicle(
                    &self.admin,
                    NewVehicle {
                        client_id: c.id,
                        make: "Toyota".into(),
                        model: "Hilux".into(),
                        year: 2018,
                        color: Some("white".into()),
                        plate: "P-1".into(),
                        vin: None,
                    },
                )
                .await
                .unwrap()
        }

        async fn service(&self, name: &str, cents: i64) -> Service {
            self.catalog
                .create_service(
                    &self.admin,
                    NewService {
                        name: name.into(),
                        description: None,
                        price: Decimal::new(cents, 2),
                        estimated_minutes: Some(30),
                    },
                )
                .await
                .unwrap()
        }

        async fn order(&self, vehicle: &Vehicle, services: &[(&Service, u32)]) -> OrderDetails {
            self.orders
                .create_order(
                    &self.admin,
                    NewOrder {
                        vehicle_id: vehicle.id,
                        employee_id: None,
                        services: services
                            .iter()
                            .map(|(s, q)| RequestedService {
                                service_id: s.id,
                                quantity: Some(*q),
                            })
                            .collect(),
                        mileage: None,
                        notes: None,
                    },
                )
                .await
                .unwrap()
        }

        async fn set_state(&self, id: OrderId, state: &str) -> ServiceResult<Order> {
            self.orders
                .update_order(
                    &self.admin,
                    id,
                    OrderPatch {
                        state: Some(state.into()),
                        ..Default::default()
                    },
                )
                .await
        }
    }

    #[tokio::test]
    async fn intake_snapshots_prices() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let details = shop.order(&v, &[(&oil, 2)]).await;

        assert_eq!(details.order.state, OrderState::Pending);
        assert_eq!(details.line_items.len(), 1);
        assert_eq!(details.line_items[0].subtotal, Decimal::new(4000, 2));

        // Repricing the service later doesn't touch the snapshot.
        shop.catalog
            .update_service(
                &shop.admin,
                oil.id,
                autoshop_catalog::ServicePatch {
                    price: Some(Decimal::new(9900, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let reloaded = shop.orders.get_order(details.order.id).await.unwrap();
        assert_eq!(reloaded.line_items[0].unit_price, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn unknown_service_rejects_the_whole_order() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let err = shop
            .orders
            .create_order(
                &shop.admin,
                NewOrder {
                    vehicle_id: v.id,
                    employee_id: None,
                    services: vec![
                        RequestedService {
                            service_id: oil.id,
                            quantity: None,
                        },
                        RequestedService {
                            service_id: ServiceId::new(),
                            quantity: None,
                        },
                    ],
                    mileage: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        assert!(shop.orders.list_orders(&OrderQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inactive_employee_cannot_be_assigned() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let order = shop.order(&v, &[(&oil, 1)]).await;
        let e = shop
            .catalog
            .create_employee(
                &shop.admin,
                NewEmployee {
                    name: "Pablo".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        shop.catalog.toggle_employee(&shop.admin, e.id).await.unwrap();

        let err = shop
            .orders
            .update_order(
                &shop.admin,
                order.order.id,
                OrderPatch {
                    employee_id: Some(e.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "precondition_failed");
    }

    #[tokio::test]
    async fn completed_orders_reject_line_items() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let order = shop.order(&v, &[(&oil, 1)]).await;
        shop.set_state(order.order.id, "completed").await.unwrap();

        let err = shop
            .orders
            .add_line_item(
                &shop.admin,
                order.order.id,
                RequestedService {
                    service_id: oil.id,
                    quantity: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "precondition_failed");
    }

    #[tokio::test]
    async fn unknown_state_is_invalid_input() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let order = shop.order(&v, &[(&oil, 1)]).await;
        let err = shop.set_state(order.order.id, "cancelled").await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn forward_policy_refuses_reversal() {
        let shop = shop(TransitionPolicy::Forward);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let order = shop.order(&v, &[(&oil, 1)]).await;
        shop.set_state(order.order.id, "completed").await.unwrap();
        let err = shop.set_state(order.order.id, "pending").await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn vehicle_with_orders_cannot_be_deleted_until_order_is() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let order = shop.order(&v, &[(&oil, 1)]).await;

        let err = shop.catalog.delete_vehicle(&shop.admin, v.id).await.unwrap_err();
        assert_eq!(err.code(), "precondition_failed");
        let err = shop.catalog.delete_service(&shop.admin, oil.id).await.unwrap_err();
        assert_eq!(err.code(), "precondition_failed");

        shop.orders.delete_order(&shop.admin, order.order.id).await.unwrap();
        shop.catalog.delete_vehicle(&shop.admin, v.id).await.unwrap();
        shop.catalog.delete_service(&shop.admin, oil.id).await.unwrap();
    }

    #[tokio::test]
    async fn state_counts_cover_every_state() {
        let shop = shop(TransitionPolicy::Permissive);
        let v = shop.vehicle().await;
        let oil = shop.service("Oil Change", 2000).await;
        let a = shop.order(&v, &[(&oil, 1)]).await;
        shop.order(&v, &[(&oil, 1)]).await;
        shop.set_state(a.order.id, "in_progress").await.unwrap();

        let overview = shop.orders.state_counts().await.unwrap();
        assert_eq!(overview.total, 2);
        assert_eq!(overview.by_state.pending, 1);
        assert_eq!(overview.by_state.in_progress, 1);
    }
}
