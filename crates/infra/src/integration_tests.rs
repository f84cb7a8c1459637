//! Integration tests for the full service stack over the in-memory store.
//!
//! Tests: intake → line items → state changes → invoice → dashboard views
//!
//! Verifies:
//! - Invoice totals use the prices snapshotted at intake
//! - Concurrent invoice attempts for one order produce exactly one invoice
//! - Analytics windows follow the shop's calendar
//! - Deletes are refused while dependents exist

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    use autoshop_analytics::{LocalCalendar, RankBy, Trend, YearMonth};
    use autoshop_auth::Principal;
    use autoshop_catalog::{
        Employee, EmployeePatch, NewClient, NewEmployee, NewService, NewVehicle, Service, Vehicle,
    };
    use autoshop_core::{Clock, FixedClock, OrderId};
    use autoshop_invoicing::{Invoice, NewInvoice};
    use autoshop_orders::{NewOrder, OrderPatch, OrderState, RequestedService, TransitionPolicy};

    use crate::services::{
        AnalyticsService, CatalogService, InvoiceService, OrderService, ServiceResult,
        TopServicesQuery,
    };
    use crate::store::InMemoryShopStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    struct Shop {
        clock: Arc<FixedClock>,
        catalog: CatalogService<InMemoryShopStore>,
        orders: OrderService<InMemoryShopStore>,
        invoices: InvoiceService<InMemoryShopStore>,
        analytics: AnalyticsService<InMemoryShopStore>,
        admin: Principal,
        vehicle: Vehicle,
        oil: Service,
        brakes: Service,
    }

    async fn shop() -> Shop {
        let store = Arc::new(InMemoryShopStore::new());
        let clock = Arc::new(FixedClock::new(at(2024, 6, 15)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let catalog = CatalogService::new(Arc::clone(&store), Arc::clone(&dyn_clock));
        let orders = OrderService::new(
            Arc::clone(&store),
            Arc::clone(&dyn_clock),
            TransitionPolicy::Permissive,
        );
        let invoices = InvoiceService::new(Arc::clone(&store), Arc::clone(&dyn_clock));
        let analytics = AnalyticsService::new(store, dyn_clock, LocalCalendar::utc());
        let admin = Principal::system();

        let client = catalog
            .create_client(
                &admin,
                NewClient {
                    name: "Ines Duarte".into(),
                    phone: "555-0100".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let vehicle = catalog
            .create_vehicle(
                &admin,
                NewVehicle {
                    client_id: client.id,
                    make: "Toyota".into(),
                    model: "Corolla".into(),
                    year: 2018,
                    color: Some("grey".into()),
                    plate: "abc-123".into(),
                    vin: None,
                },
            )
            .await
            .unwrap();
        let oil = catalog
            .create_service(
                &admin,
                NewService {
                    name: "Oil Change".into(),
                    description: None,
                    price: Decimal::new(2000, 2),
                    estimated_minutes: Some(30),
                },
            )
            .await
            .unwrap();
        let brakes = catalog
            .create_service(
                &admin,
                NewService {
                    name: "Brake Pads".into(),
                    description: None,
                    price: Decimal::new(6000, 2),
                    estimated_minutes: Some(90),
                },
            )
            .await
            .unwrap();

        Shop {
            clock,
            catalog,
            orders,
            invoices,
            analytics,
            admin,
            vehicle,
            oil,
            brakes,
        }
    }

    impl Shop {
        async fn employee(&self, name: &str) -> Employee {
            self.catalog
                .create_employee(
                    &self.admin,
                    NewEmployee {
                        name: name.into(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }

        async fn order(&self, employee: Option<&Employee>, lines: &[(&Service, u32)]) -> OrderId {
            let details = self
                .orders
                .create_order(
                    &self.admin,
                    NewOrder {
                        vehicle_id: self.vehicle.id,
                        employee_id: employee.map(|e| e.id),
                        services: lines
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
                .unwrap();
            details.order.id
        }

        async fn set_state(&self, id: OrderId, state: OrderState) {
            self.orders
                .update_order(
                    &self.admin,
                    id,
                    OrderPatch {
                        state: Some(state.as_str().into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        async fn invoice(&self, id: OrderId) -> ServiceResult<Invoice> {
            self.invoices
                .create_invoice(
                    &self.admin,
                    NewInvoice {
                        order_id: id,
                        payment_method: None,
                    },
                )
                .await
        }

        async fn billed(&self, lines: &[(&Service, u32)]) -> Invoice {
            let id = self.order(None, lines).await;
            self.set_state(id, OrderState::Completed).await;
            self.invoice(id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn intake_to_invoice_uses_snapshotted_prices() {
        let shop = shop().await;
        let id = shop.order(None, &[(&shop.oil, 2)]).await;

        shop.catalog
            .update_service(
                &shop.admin,
                shop.oil.id,
                autoshop_catalog::ServicePatch {
                    price: Some(Decimal::new(9900, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        shop.set_state(id, OrderState::Completed).await;
        let invoice = shop.invoice(id).await.unwrap();
        assert_eq!(invoice.subtotal, Decimal::new(4000, 2));
        assert_eq!(invoice.tax, Decimal::new(480, 2));
        assert_eq!(invoice.total, Decimal::new(4480, 2));
        assert_eq!(invoice.payment_method, "cash");

        let dashboard = shop.analytics.dashboard().await.unwrap();
        assert_eq!(dashboard.revenue_today, Decimal::new(4480, 2));
        assert_eq!(dashboard.revenue_month, Decimal::new(4480, 2));
        assert_eq!(dashboard.invoices_month, 1);
        assert_eq!(dashboard.orders.total, 1);
        assert_eq!(dashboard.orders.by_state.completed, 1);
        assert_eq!(dashboard.clients, 1);
        assert_eq!(dashboard.vehicles, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invoices_for_one_order_issue_exactly_one() {
        let shop = shop().await;
        let id = shop.order(None, &[(&shop.brakes, 1)]).await;
        shop.set_state(id, OrderState::Delivered).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let invoices = shop.invoices.clone();
            let admin = shop.admin.clone();
            tasks.push(tokio::spawn(async move {
                invoices
                    .create_invoice(
                        &admin,
                        NewInvoice {
                            order_id: id,
                            payment_method: Some("card".into()),
                        },
                    )
                    .await
            }));
        }

        let mut issued = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => issued += 1,
                Err(e) => {
                    assert_eq!(e.code(), "conflict");
                    conflicts += 1;
                }
            }
        }
        assert_eq!(issued, 1);
        assert_eq!(conflicts, 7);

        let summary = shop.invoices.sales_summary(None).await.unwrap();
        assert_eq!(summary.invoice_count, 1);
    }

    #[tokio::test]
    async fn monthly_series_skips_empty_months() {
        let shop = shop().await;

        shop.clock.set(at(2024, 4, 10));
        shop.billed(&[(&shop.oil, 1)]).await;
        shop.clock.set(at(2024, 6, 15));
        shop.billed(&[(&shop.brakes, 1)]).await;
        shop.billed(&[(&shop.oil, 1)]).await;

        let series = shop.analytics.monthly_revenue().await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].month, YearMonth { year: 2024, month: 4 });
        assert_eq!(series[0].total, Decimal::new(2240, 2));
        assert_eq!(series[1].month, YearMonth { year: 2024, month: 6 });
        assert_eq!(series[1].invoice_count, 2);
        assert_eq!(series[1].total, Decimal::new(8960, 2));
    }

    #[tokio::test]
    async fn monthly_comparison_reports_growth() {
        let shop = shop().await;

        shop.clock.set(at(2024, 5, 20));
        shop.billed(&[(&shop.oil, 1)]).await;
        shop.clock.set(at(2024, 6, 15));
        shop.billed(&[(&shop.oil, 2)]).await;

        let cmp = shop.analytics.monthly_comparison().await.unwrap();
        assert_eq!(cmp.current.total, Decimal::new(4480, 2));
        assert_eq!(cmp.previous.total, Decimal::new(2240, 2));
        assert_eq!(cmp.difference, Decimal::new(2240, 2));
        assert_eq!(cmp.percent_change, Decimal::new(10000, 2));
        assert_eq!(cmp.trend, Trend::Positive);
    }

    #[tokio::test]
    async fn rankings_follow_line_items_and_completions() {
        let shop = shop().await;
        let ana = shop.employee("Ana").await;
        let bruno = shop.employee("Bruno").await;
        let idle = shop.employee("Carla").await;
        shop.catalog
            .update_employee(
                &shop.admin,
                idle.id,
                EmployeePatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let a1 = shop.order(Some(&ana), &[(&shop.brakes, 1)]).await;
        let a2 = shop.order(Some(&ana), &[(&shop.brakes, 1)]).await;
        let b1 = shop.order(Some(&bruno), &[(&shop.oil, 3)]).await;
        for id in [a1, a2, b1] {
            shop.set_state(id, OrderState::Completed).await;
        }

        let by_quantity = shop
            .analytics
            .top_services(TopServicesQuery::default())
            .await
            .unwrap();
        assert_eq!(by_quantity[0].service_id, shop.oil.id);
        assert_eq!(by_quantity[0].quantity_sold, 3);

        let by_revenue = shop
            .analytics
            .top_services(TopServicesQuery {
                by: RankBy::Revenue,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_revenue[0].service_id, shop.brakes.id);
        assert_eq!(by_revenue[0].revenue, Decimal::new(12000, 2));

        let popular = shop.analytics.popular_services(1).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].service_id, shop.brakes.id);
        assert_eq!(popular[0].line_count, 2);

        let productive = shop.analytics.productive_employees(5).await.unwrap();
        let names: Vec<&str> = productive.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ana", "Bruno"]);
        assert_eq!(productive[0].completed_orders, 2);

        let stats = shop.analytics.employee_stats(ana.id).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.by_state.completed, 2);
    }

    #[tokio::test]
    async fn state_distribution_accounts_for_every_order() {
        let shop = shop().await;
        let a = shop.order(None, &[(&shop.oil, 1)]).await;
        let b = shop.order(None, &[(&shop.oil, 1)]).await;
        shop.order(None, &[(&shop.oil, 1)]).await;
        shop.set_state(a, OrderState::InProgress).await;
        shop.set_state(b, OrderState::Delivered).await;

        let shares = shop.analytics.state_distribution().await.unwrap();
        assert_eq!(shares.len(), 4);
        assert_eq!(shares.iter().map(|s| s.count).sum::<u64>(), 3);

        let overview = shop.orders.state_counts().await.unwrap();
        assert_eq!(overview.total, 3);
        assert_eq!(overview.by_state.pending, 1);

        let recent = shop.analytics.recent_orders(2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn deletes_are_refused_while_dependents_exist() {
        let shop = shop().await;
        let tech = shop.employee("Dario").await;
        let id = shop.order(Some(&tech), &[(&shop.oil, 1)]).await;
        shop.set_state(id, OrderState::Completed).await;
        let invoice = shop.invoice(id).await.unwrap();

        let client_id = shop.vehicle.client_id;
        let refused = [
            shop.catalog.delete_client(&shop.admin, client_id).await,
            shop.catalog.delete_vehicle(&shop.admin, shop.vehicle.id).await,
            shop.catalog.delete_employee(&shop.admin, tech.id).await,
            shop.catalog.delete_service(&shop.admin, shop.oil.id).await,
            shop.orders.delete_order(&shop.admin, id).await,
        ];
        for result in refused {
            assert_eq!(result.unwrap_err().code(), "precondition_failed");
        }

        shop.invoices.delete_invoice(&shop.admin, invoice.id).await.unwrap();
        shop.orders.delete_order(&shop.admin, id).await.unwrap();
        shop.catalog.delete_service(&shop.admin, shop.oil.id).await.unwrap();
        shop.catalog.delete_employee(&shop.admin, tech.id).await.unwrap();
        shop.catalog.delete_vehicle(&shop.admin, shop.vehicle.id).await.unwrap();
        shop.catalog.delete_client(&shop.admin, client_id).await.unwrap();
        assert!(shop.catalog.get_vehicle(shop.vehicle.id).await.is_err());
    }
}
