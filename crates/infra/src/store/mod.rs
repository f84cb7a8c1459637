//! Storage port for shop data.
//!
//! `ShopStore` is the single seam between the application services and the
//! backing database. Implementations must:
//!
//! - enforce every uniqueness rule with a constraint, not a read-then-write
//!   (client phone, vehicle plate/VIN, employee/service name case-insensitively,
//!   one invoice per order);
//! - refuse to delete rows that are still referenced;
//! - write an order with its line items, and delete an order with its line
//!   items, atomically;
//! - re-check that an order still accepts line items at insert time.
//!
//! Backends:
//! - [`InMemoryShopStore`]: tests/dev, one lock around all tables
//! - [`PostgresShopStore`]: sqlx + Postgres

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use autoshop_analytics::EntityCounts;
use autoshop_catalog::{Client, Employee, Service, Vehicle};
use autoshop_core::{
    ClientId, EmployeeId, InvoiceId, OrderId, ServiceId, TimeRange, VehicleId,
};
use autoshop_invoicing::Invoice;
use autoshop_orders::{LineItem, Order, OrderState, StateCounts};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryShopStore;
pub use postgres::PostgresShopStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Uniqueness rules a store enforces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    ClientPhone,
    VehiclePlate,
    VehicleVin,
    EmployeeName,
    ServiceName,
    InvoicePerOrder,
}

impl Constraint {
    pub fn describe(self) -> &'static str {
        match self {
            Constraint::ClientPhone => "a client with this phone already exists",
            Constraint::VehiclePlate => "a vehicle with this plate already exists",
            Constraint::VehicleVin => "a vehicle with this VIN already exists",
            Constraint::EmployeeName => "an employee with this name already exists",
            Constraint::ServiceName => "a service with this name already exists",
            Constraint::InvoicePerOrder => "order already invoiced",
        }
    }
}

/// A row that keeps another row from being deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dependent {
    ClientVehicles,
    VehicleOrders,
    EmployeeOrders,
    ServiceLineItems,
    OrderInvoice,
}

impl Dependent {
    pub fn describe(self) -> &'static str {
        match self {
            Dependent::ClientVehicles => "client still owns vehicles",
            Dependent::VehicleOrders => "vehicle has orders",
            Dependent::EmployeeOrders => "employee has orders; deactivate instead",
            Dependent::ServiceLineItems => "service is billed on orders; deactivate instead",
            Dependent::OrderInvoice => "order has an invoice",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {}", .0.describe())]
    UniqueViolation(Constraint),

    #[error("still referenced: {}", .0.describe())]
    Referenced(Dependent),

    /// The row to update/delete does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A foreign key points at a row that does not exist (anymore).
    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),

    #[error("order {0} no longer accepts line items")]
    OrderClosed(OrderId),

    #[error("order {0} is not completed or delivered")]
    OrderNotBillable(OrderId),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Search + limit for catalog listings. Results are newest first unless noted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Case-insensitive substring; semantics per entity.
    pub search: Option<String>,
    /// Employees/services only.
    pub active: Option<bool>,
    /// Vehicles only.
    pub client_id: Option<ClientId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub state: Option<OrderState>,
    pub vehicle_id: Option<VehicleId>,
    pub employee_id: Option<EmployeeId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub issued: Option<TimeRange>,
    pub payment_method: Option<String>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait ShopStore: Send + Sync {
    // clients
    async fn insert_client(&self, client: &Client) -> StoreResult<()>;
    async fn update_client(&self, client: &Client) -> StoreResult<()>;
    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>>;
    async fn list_clients(&self, query: &CatalogQuery) -> StoreResult<Vec<Client>>;
    async fn delete_client(&self, id: ClientId) -> StoreResult<()>;

    // vehicles
    async fn insert_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()>;
    async fn update_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()>;
    async fn get_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>>;
    async fn list_vehicles(&self, query: &CatalogQuery) -> StoreResult<Vec<Vehicle>>;
    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<()>;

    // employees (listed by name)
    async fn insert_employee(&self, employee: &Employee) -> StoreResult<()>;
    async fn update_employee(&self, employee: &Employee) -> StoreResult<()>;
    async fn get_employee(&self, id: EmployeeId) -> StoreResult<Option<Employee>>;
    async fn list_employees(&self, query: &CatalogQuery) -> StoreResult<Vec<Employee>>;
    async fn delete_employee(&self, id: EmployeeId) -> StoreResult<()>;

    // services (listed by name)
    async fn insert_service(&self, service: &Service) -> StoreResult<()>;
    async fn update_service(&self, service: &Service) -> StoreResult<()>;
    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<Service>>;
    /// Whatever subset of `ids` exists, in no particular order.
    async fn get_services(&self, ids: &[ServiceId]) -> StoreResult<Vec<Service>>;
    async fn list_services(&self, query: &CatalogQuery) -> StoreResult<Vec<Service>>;
    async fn delete_service(&self, id: ServiceId) -> StoreResult<()>;

    // orders
    /// Order and lines in one unit.
    async fn insert_order(&self, order: &Order, lines: &[LineItem]) -> StoreResult<()>;
    async fn update_order(&self, order: &Order) -> StoreResult<()>;
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    /// Newest entry first.
    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;
    /// Creation order.
    async fn line_items(&self, order_id: OrderId) -> StoreResult<Vec<LineItem>>;
    /// Fails with [`StoreError::OrderClosed`] if the order is billable at insert time,
    /// i.e. completed or delivered.
    async fn append_line_item(&self, line: &LineItem) -> StoreResult<()>;
    /// Cascades line items; refuses if an invoice exists.
    async fn delete_order(&self, id: OrderId) -> StoreResult<()>;

    // invoices
    /// Fails with [`StoreError::OrderNotBillable`] unless the order is billable
    /// at insert time, and with a uniqueness violation if it is already invoiced.
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn invoice_for_order(&self, order_id: OrderId) -> StoreResult<Option<Invoice>>;
    /// Newest first.
    async fn list_invoices(&self, query: &InvoiceQuery) -> StoreResult<Vec<Invoice>>;
    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()>;

    // aggregation
    async fn entity_counts(&self) -> StoreResult<EntityCounts>;
    async fn order_state_counts(&self, employee_id: Option<EmployeeId>) -> StoreResult<StateCounts>;
    /// Completed orders per employee, by order entry date.
    async fn completed_orders_by_employee(
        &self,
        entered: TimeRange,
    ) -> StoreResult<HashMap<EmployeeId, u64>>;

    /// Invoices issued inside `range`, oldest first.
    fn invoices_issued(&self, range: TimeRange) -> BoxStream<'_, StoreResult<Invoice>>;
    /// Line items in creation order, optionally only for orders entered in `entered`.
    fn line_item_stream(&self, entered: Option<TimeRange>) -> BoxStream<'_, StoreResult<LineItem>>;
}

#[async_trait]
impl<S> ShopStore for Arc<S>
where
    S: ShopStore + ?Sized,
{
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        (**self).insert_client(client).await
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        (**self).update_client(client).await
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        (**self).get_client(id).await
    }

    async fn list_clients(&self, query: &CatalogQuery) -> StoreResult<Vec<Client>> {
        (**self).list_clients(query).await
    }

    async fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        (**self).delete_client(id).await
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        (**self).insert_vehicle(vehicle).await
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        (**self).update_vehicle(vehicle).await
    }

    async fn get_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        (**self).get_vehicle(id).await
    }

    async fn list_vehicles(&self, query: &CatalogQuery) -> StoreResult<Vec<Vehicle>> {
        (**self).list_vehicles(query).await
    }

    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<()> {
        (**self).delete_vehicle(id).await
    }

    async fn insert_employee(&self, employee: &Employee) -> StoreResult<()> {
        (**self).insert_employee(employee).await
    }

    async fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        (**self).update_employee(employee).await
    }

    async fn get_employee(&self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        (**self).get_employee(id).await
    }

    async fn list_employees(&self, query: &CatalogQuery) -> StoreResult<Vec<Employee>> {
        (**self).list_employees(query).await
    }

    async fn delete_employee(&self, id: EmployeeId) -> StoreResult<()> {
        (**self).delete_employee(id).await
    }

    async fn insert_service(&self, service: &Service) -> StoreResult<()> {
        (**self).insert_service(service).await
    }

    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        (**self).update_service(service).await
    }

    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<Service>> {
        (**self).get_service(id).await
    }

    async fn get_services(&self, ids: &[ServiceId]) -> StoreResult<Vec<Service>> {
        (**self).get_services(ids).await
    }

    async fn list_services(&self, query: &CatalogQuery) -> StoreResult<Vec<Service>> {
        (**self).list_services(query).await
    }

    async fn delete_service(&self, id: ServiceId) -> StoreResult<()> {
        (**self).delete_service(id).await
    }

    async fn insert_order(&self, order: &Order, lines: &[LineItem]) -> StoreResult<()> {
        (**self).insert_order(order, lines).await
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        (**self).update_order(order).await
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        (**self).get_order(id).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        (**self).list_orders(query).await
    }

    async fn line_items(&self, order_id: OrderId) -> StoreResult<Vec<LineItem>> {
        (**self).line_items(order_id).await
    }

    async fn append_line_item(&self, line: &LineItem) -> StoreResult<()> {
        (**self).append_line_item(line).await
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        (**self).delete_order(id).await
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        (**self).insert_invoice(invoice).await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        (**self).update_invoice(invoice).await
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        (**self).get_invoice(id).await
    }

    async fn invoice_for_order(&self, order_id: OrderId) -> StoreResult<Option<Invoice>> {
        (**self).invoice_for_order(order_id).await
    }

    async fn list_invoices(&self, query: &InvoiceQuery) -> StoreResult<Vec<Invoice>> {
        (**self).list_invoices(query).await
    }

    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()> {
        (**self).delete_invoice(id).await
    }

    async fn entity_counts(&self) -> StoreResult<EntityCounts> {
        (**self).entity_counts().await
    }

    async fn order_state_counts(&self, employee_id: Option<EmployeeId>) -> StoreResult<StateCounts> {
        (**self).order_state_counts(employee_id).await
    }

    async fn completed_orders_by_employee(&self, entered: TimeRange) -> StoreResult<HashMap<EmployeeId, u64>> {
        (**self).completed_orders_by_employee(entered).await
    }

    fn invoices_issued(&self, range: TimeRange) -> BoxStream<'_, StoreResult<Invoice>> {
        (**self).invoices_issued(range)
    }

    fn line_item_stream(&self, entered: Option<TimeRange>) -> BoxStream<'_, StoreResult<LineItem>> {
        (**self).line_item_stream(entered)
    }
}
