use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use uuid::Uuid;

use autoshop_analytics::EntityCounts;
use autoshop_catalog::{Client, Employee, Service, Vehicle};
use autoshop_core::{
    ClientId, EmployeeId, Entity, InvoiceId, OrderId, ServiceId, TimeRange, VehicleId,
};
use autoshop_invoicing::Invoice;
use autoshop_orders::{LineItem, Order, OrderState, StateCounts};

use super::{
    CatalogQuery, Constraint, Dependent, InvoiceQuery, OrderQuery, ShopStore, StoreError, StoreResult,
};

/// In-memory shop store.
///
/// Intended for tests/dev. Not optimized for performance: every table is a
/// `Vec` in insertion order and lookups scan. All writes take one lock, which
/// is what makes each of them atomic.
#[derive(Debug, Default)]
pub struct InMemoryShopStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    clients: Vec<Client>,
    vehicles: Vec<Vehicle>,
    employees: Vec<Employee>,
    services: Vec<Service>,
    orders: Vec<Order>,
    line_items: Vec<LineItem>,
    invoices: Vec<Invoice>,
    unique: UniqueIndex,
}

/// Unique keys, owned by the row id that holds them.
#[derive(Debug, Default)]
struct UniqueIndex {
    keys: HashMap<(Constraint, String), Uuid>,
}

impl UniqueIndex {
    fn check(&self, constraint: Constraint, key: Option<&str>, owner: Uuid) -> StoreResult<()> {
        let Some(key) = key else { return Ok(()) };
        match self.keys.get(&(constraint, key.to_string())) {
            Some(holder) if *holder != owner => Err(StoreError::UniqueViolation(constraint)),
            _ => Ok(()),
        }
    }

    /// Move `owner`'s key from `old` to `new`. Call only after `check` passed.
    fn set(&mut self, constraint: Constraint, old: Option<&str>, new: Option<&str>, owner: Uuid) {
        if let Some(old) = old {
            self.release(constraint, old, owner);
        }
        if let Some(new) = new {
            self.keys.insert((constraint, new.to_string()), owner);
        }
    }

    fn release(&mut self, constraint: Constraint, key: &str, owner: Uuid) {
        let k = (constraint, key.to_string());
        if self.keys.get(&k) == Some(&owner) {
            self.keys.remove(&k);
        }
    }
}

fn find<T: Entity>(rows: &[T], id: T::Id) -> Option<&T> {
    rows.iter().find(|r| r.id() == id)
}

fn position<T: Entity>(rows: &[T], id: T::Id, what: &'static str) -> StoreResult<usize> {
    rows.iter()
        .position(|r| r.id() == id)
        .ok_or(StoreError::NotFound(what))
}

fn limited<T>(rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(n) => rows.into_iter().take(n).collect(),
        None => rows,
    }
}

/// Newest first by `key`; rows with equal keys keep reverse insertion order.
fn newest_first<T: Clone, K: Ord>(
    rows: &[T],
    keep: impl Fn(&T) -> bool,
    key: impl Fn(&T) -> K,
    limit: Option<usize>,
) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().filter(|r| keep(r)).cloned().collect();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    limited(out, limit)
}

fn by_name<T: Clone>(
    rows: &[T],
    keep: impl Fn(&T) -> bool,
    name: impl Fn(&T) -> String,
    limit: Option<usize>,
) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().filter(|r| keep(r)).cloned().collect();
    out.sort_by_key(|r| name(r));
    limited(out, limit)
}

fn search_matches(search: &Option<String>, matches: impl FnOnce(&str) -> bool) -> bool {
    search.as_deref().is_none_or(matches)
}

impl Tables {
    fn ensure_client(&self, id: ClientId) -> StoreResult<()> {
        find(&self.clients, id)
            .map(|_| ())
            .ok_or(StoreError::MissingReference("client"))
    }

    fn ensure_order_refs(&self, order: &Order) -> StoreResult<()> {
        find(&self.vehicles, order.vehicle_id).ok_or(StoreError::MissingReference("vehicle"))?;
        if let Some(e) = order.employee_id {
            find(&self.employees, e).ok_or(StoreError::MissingReference("employee"))?;
        }
        Ok(())
    }

    fn check_vehicle_keys(&self, v: &Vehicle) -> StoreResult<()> {
        let owner = *v.id.as_uuid();
        self.unique.check(Constraint::VehiclePlate, Some(&v.plate), owner)?;
        self.unique.check(Constraint::VehicleVin, v.vin.as_deref(), owner)
    }
}

impl InMemoryShopStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl ShopStore for InMemoryShopStore {
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let mut t = self.write()?;
        let owner = *client.id.as_uuid();
        t.unique.check(Constraint::ClientPhone, Some(&client.phone), owner)?;
        t.unique.set(Constraint::ClientPhone, None, Some(&client.phone), owner);
        t.clients.push(client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.clients, client.id, "client")?;
        let owner = *client.id.as_uuid();
        t.unique.check(Constraint::ClientPhone, Some(&client.phone), owner)?;
        let old = t.clients[pos].phone.clone();
        t.unique.set(Constraint::ClientPhone, Some(&old), Some(&client.phone), owner);
        t.clients[pos] = client.clone();
        Ok(())
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(find(&self.read()?.clients, id).cloned())
    }

    async fn list_clients(&self, query: &CatalogQuery) -> StoreResult<Vec<Client>> {
        let t = self.read()?;
        Ok(newest_first(
            &t.clients,
            |c| search_matches(&query.search, |q| c.matches(q)),
            |c| c.created_at,
            query.limit,
        ))
    }

    async fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.clients, id, "client")?;
        if t.vehicles.iter().any(|v| v.client_id == id) {
            return Err(StoreError::Referenced(Dependent::ClientVehicles));
        }
        let removed = t.clients.remove(pos);
        t.unique
            .release(Constraint::ClientPhone, &removed.phone, *id.as_uuid());
        Ok(())
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let mut t = self.write()?;
        t.ensure_client(vehicle.client_id)?;
        t.check_vehicle_keys(vehicle)?;
        let owner = *vehicle.id.as_uuid();
        t.unique.set(Constraint::VehiclePlate, None, Some(&vehicle.plate), owner);
        t.unique.set(Constraint::VehicleVin, None, vehicle.vin.as_deref(), owner);
        t.vehicles.push(vehicle.clone());
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.vehicles, vehicle.id, "vehicle")?;
        t.ensure_client(vehicle.client_id)?;
        t.check_vehicle_keys(vehicle)?;
        let owner = *vehicle.id.as_uuid();
        let old = t.vehicles[pos].clone();
        t.unique
            .set(Constraint::VehiclePlate, Some(&old.plate), Some(&vehicle.plate), owner);
        t.unique
            .set(Constraint::VehicleVin, old.vin.as_deref(), vehicle.vin.as_deref(), owner);
        t.vehicles[pos] = vehicle.clone();
        Ok(())
    }

    async fn get_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        Ok(find(&self.read()?.vehicles, id).cloned())
    }

    async fn list_vehicles(&self, query: &CatalogQuery) -> StoreResult<Vec<Vehicle>> {
        let t = self.read()?;
        Ok(newest_first(
            &t.vehicles,
            |v| {
                query.client_id.is_none_or(|c| v.client_id == c)
                    && search_matches(&query.search, |q| v.matches(q))
            },
            |v| v.created_at,
            query.limit,
        ))
    }

    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.vehicles, id, "vehicle")?;
        if t.orders.iter().any(|o| o.vehicle_id == id) {
            return Err(StoreError::Referenced(Dependent::VehicleOrders));
        }
        let removed = t.vehicles.remove(pos);
        let owner = *id.as_uuid();
        t.unique.release(Constraint::VehiclePlate, &removed.plate, owner);
        if let Some(vin) = &removed.vin {
            t.unique.release(Constraint::VehicleVin, vin, owner);
        }
        Ok(())
    }

    async fn insert_employee(&self, employee: &Employee) -> StoreResult<()> {
        let mut t = self.write()?;
        let owner = *employee.id.as_uuid();
        let key = employee.name_key();
        t.unique.check(Constraint::EmployeeName, Some(&key), owner)?;
        t.unique.set(Constraint::EmployeeName, None, Some(&key), owner);
        t.employees.push(employee.clone());
        Ok(())
    }

    async fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.employees, employee.id, "employee")?;
        let owner = *employee.id.as_uuid();
        let key = employee.name_key();
        t.unique.check(Constraint::EmployeeName, Some(&key), owner)?;
        let old = t.employees[pos].name_key();
        t.unique.set(Constraint::EmployeeName, Some(&old), Some(&key), owner);
        t.employees[pos] = employee.clone();
        Ok(())
    }

    async fn get_employee(&self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        Ok(find(&self.read()?.employees, id).cloned())
    }

    async fn list_employees(&self, query: &CatalogQuery) -> StoreResult<Vec<Employee>> {
        let t = self.read()?;
        Ok(by_name(
            &t.employees,
            |e| {
                query.active.is_none_or(|a| e.active == a)
                    && search_matches(&query.search, |q| e.matches(q))
            },
            Employee::name_key,
            query.limit,
        ))
    }

    async fn delete_employee(&self, id: EmployeeId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.employees, id, "employee")?;
        if t.orders.iter().any(|o| o.employee_id == Some(id)) {
            return Err(StoreError::Referenced(Dependent::EmployeeOrders));
        }
        let removed = t.employees.remove(pos);
        t.unique
            .release(Constraint::EmployeeName, &removed.name_key(), *id.as_uuid());
        Ok(())
    }

    async fn insert_service(&self, service: &Service) -> StoreResult<()> {
        let mut t = self.write()?;
        let owner = *service.id.as_uuid();
        let key = service.name_key();
        t.unique.check(Constraint::ServiceName, Some(&key), owner)?;
        t.unique.set(Constraint::ServiceName, None, Some(&key), owner);
        t.services.push(service.clone());
        Ok(())
    }

    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.services, service.id, "service")?;
        let owner = *service.id.as_uuid();
        let key = service.name_key();
        t.unique.check(Constraint::ServiceName, Some(&key), owner)?;
        let old = t.services[pos].name_key();
        t.unique.set(Constraint::ServiceName, Some(&old), Some(&key), owner);
        t.services[pos] = service.clone();
        Ok(())
    }

    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<Service>> {
        Ok(find(&self.read()?.services, id).cloned())
    }

    async fn get_services(&self, ids: &[ServiceId]) -> StoreResult<Vec<Service>> {
        let t = self.read()?;
        Ok(t.services
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn list_services(&self, query: &CatalogQuery) -> StoreResult<Vec<Service>> {
        let t = self.read()?;
        Ok(by_name(
            &t.services,
            |s| {
                query.active.is_none_or(|a| s.active == a)
                    && search_matches(&query.search, |q| s.matches(q))
            },
            Service::name_key,
            query.limit,
        ))
    }

    async fn delete_service(&self, id: ServiceId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.services, id, "service")?;
        if t.line_items.iter().any(|l| l.service_id == id) {
            return Err(StoreError::Referenced(Dependent::ServiceLineItems));
        }
        let removed = t.services.remove(pos);
        t.unique
            .release(Constraint::ServiceName, &removed.name_key(), *id.as_uuid());
        Ok(())
    }

    async fn insert_order(&self, order: &Order, lines: &[LineItem]) -> StoreResult<()> {
        let mut t = self.write()?;
        t.ensure_order_refs(order)?;
        for line in lines {
            find(&t.services, line.service_id).ok_or(StoreError::MissingReference("service"))?;
        }
        t.orders.push(order.clone());
        t.line_items.extend_from_slice(lines);
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.orders, order.id, "order")?;
        t.ensure_order_refs(order)?;
        t.orders[pos] = order.clone();
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(find(&self.read()?.orders, id).cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let t = self.read()?;
        Ok(newest_first(
            &t.orders,
            |o| {
                query.state.is_none_or(|s| o.state == s)
                    && query.vehicle_id.is_none_or(|v| o.vehicle_id == v)
                    && query.employee_id.is_none_or(|e| o.employee_id == Some(e))
            },
            |o| o.entered_at,
            query.limit,
        ))
    }

    async fn line_items(&self, order_id: OrderId) -> StoreResult<Vec<LineItem>> {
        let t = self.read()?;
        Ok(t.line_items
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn append_line_item(&self, line: &LineItem) -> StoreResult<()> {
        let mut t = self.write()?;
        let order = find(&t.orders, line.order_id).ok_or(StoreError::MissingReference("order"))?;
        if !order.state.accepts_line_items() {
            return Err(StoreError::OrderClosed(order.id));
        }
        find(&t.services, line.service_id).ok_or(StoreError::MissingReference("service"))?;
        t.line_items.push(line.clone());
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.orders, id, "order")?;
        if t.invoices.iter().any(|i| i.order_id == id) {
            return Err(StoreError::Referenced(Dependent::OrderInvoice));
        }
        t.line_items.retain(|l| l.order_id != id);
        t.orders.remove(pos);
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut t = self.write()?;
        let order = find(&t.orders, invoice.order_id).ok_or(StoreError::MissingReference("order"))?;
        if !order.state.is_billable() {
            return Err(StoreError::OrderNotBillable(order.id));
        }
        let key = invoice.order_id.to_string();
        let owner = *invoice.id.as_uuid();
        t.unique.check(Constraint::InvoicePerOrder, Some(&key), owner)?;
        t.unique.set(Constraint::InvoicePerOrder, None, Some(&key), owner);
        t.invoices.push(invoice.clone());
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.invoices, invoice.id, "invoice")?;
        t.invoices[pos] = invoice.clone();
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(find(&self.read()?.invoices, id).cloned())
    }

    async fn invoice_for_order(&self, order_id: OrderId) -> StoreResult<Option<Invoice>> {
        let t = self.read()?;
        Ok(t.invoices.iter().find(|i| i.order_id == order_id).cloned())
    }

    async fn list_invoices(&self, query: &InvoiceQuery) -> StoreResult<Vec<Invoice>> {
        let t = self.read()?;
        Ok(newest_first(
            &t.invoices,
            |i| {
                query.issued.is_none_or(|r| r.contains(i.issued_at))
                    && query
                        .payment_method
                        .as_deref()
                        .is_none_or(|m| i.payment_method.eq_ignore_ascii_case(m))
            },
            |i| i.issued_at,
            query.limit,
        ))
    }

    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()> {
        let mut t = self.write()?;
        let pos = position(&t.invoices, id, "invoice")?;
        let removed = t.invoices.remove(pos);
        t.unique.release(
            Constraint::InvoicePerOrder,
            &removed.order_id.to_string(),
            *id.as_uuid(),
        );
        Ok(())
    }

    async fn entity_counts(&self) -> StoreResult<EntityCounts> {
        let t = self.read()?;
        Ok(EntityCounts {
            clients: t.clients.len() as u64,
            vehicles: t.vehicles.len() as u64,
            active_employees: t.employees.iter().filter(|e| e.active).count() as u64,
            active_services: t.services.iter().filter(|s| s.active).count() as u64,
            orders: t.orders.iter().map(|o| o.state).collect(),
        })
    }

    async fn order_state_counts(&self, employee_id: Option<EmployeeId>) -> StoreResult<StateCounts> {
        let t = self.read()?;
        Ok(t.orders
            .iter()
            .filter(|o| employee_id.is_none_or(|e| o.employee_id == Some(e)))
            .map(|o| o.state)
            .collect())
    }

    async fn completed_orders_by_employee(
        &self,
        entered: TimeRange,
    ) -> StoreResult<HashMap<EmployeeId, u64>> {
        let t = self.read()?;
        let mut out = HashMap::new();
        for o in &t.orders {
            if o.state != OrderState::Completed || !entered.contains(o.entered_at) {
                continue;
            }
            if let Some(e) = o.employee_id {
                *out.entry(e).or_insert(0) += 1;
            }
        }
        Ok(out)
    }

    fn invoices_issued(&self, range: TimeRange) -> BoxStream<'_, StoreResult<Invoice>> {
        let rows = self.read().map(|t| {
            let mut rows: Vec<Invoice> = t
                .invoices
                .iter()
                .filter(|i| range.contains(i.issued_at))
                .cloned()
                .collect();
            rows.sort_by_key(|i| i.issued_at);
            rows
        });
        match rows {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }

    fn line_item_stream(&self, entered: Option<TimeRange>) -> BoxStream<'_, StoreResult<LineItem>> {
        let rows = self.read().map(|t| {
            let orders: Option<HashSet<OrderId>> = entered.map(|r| {
                t.orders
                    .iter()
                    .filter(|o| r.contains(o.entered_at))
                    .map(|o| o.id)
                    .collect()
            });
            t.line_items
                .iter()
                .filter(|l| orders.as_ref().is_none_or(|ids| ids.contains(&l.order_id)))
                .cloned()
                .collect::<Vec<_>>()
        });
        match rows {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}
