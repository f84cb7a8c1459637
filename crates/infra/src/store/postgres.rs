//! Postgres-backed shop store.
//!
//! Every rule listed on [`ShopStore`] is enforced by the schema in
//! [`SCHEMA`]: named `UNIQUE` constraints/indexes for uniqueness, `ON DELETE
//! RESTRICT` foreign keys for "still referenced", `ON DELETE CASCADE` from line
//! items to their order, and a row lock on the order while a line item is
//! appended.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | Duplicate phone/plate/VIN/name, second invoice for an order |
//! | Database (foreign key violation) on delete | `23503` | `Referenced` | Row still has dependents |
//! | Database (foreign key violation) on write | `23503` | `MissingReference` | Referenced row does not exist |
//! | Database (check constraint violation) | `23514` | `Backend` | Domain validation was bypassed |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Backend` | Connection failures |
//!
//! ## Thread Safety
//!
//! `PostgresShopStore` is `Send + Sync` and cheap to clone; all access goes
//! through the SQLx connection pool.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use autoshop_analytics::EntityCounts;
use autoshop_catalog::{Client, Employee, Service, Vehicle};
use autoshop_core::{
    ClientId, EmployeeId, InvoiceId, LineItemId, OrderId, ServiceId, TimeRange, VehicleId,
};
use autoshop_invoicing::Invoice;
use autoshop_orders::{LineItem, Order, OrderState, StateCounts};

use super::{
    CatalogQuery, Constraint, Dependent, InvoiceQuery, OrderQuery, ShopStore, StoreError, StoreResult,
};

/// Schema applied by [`PostgresShopStore::migrate`]. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL CONSTRAINT clients_phone_key UNIQUE,
    email       TEXT,
    address     TEXT,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS vehicles (
    id          UUID PRIMARY KEY,
    client_id   UUID NOT NULL
                CONSTRAINT vehicles_client_id_fkey REFERENCES clients (id) ON DELETE RESTRICT,
    make        TEXT NOT NULL,
    model       TEXT NOT NULL,
    year        INTEGER NOT NULL,
    color       TEXT,
    plate       TEXT NOT NULL CONSTRAINT vehicles_plate_key UNIQUE,
    vin         TEXT CONSTRAINT vehicles_vin_key UNIQUE,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS employees (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    specialty   TEXT,
    phone       TEXT,
    salary      NUMERIC,
    active      BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS employees_name_key ON employees (lower(name));

CREATE TABLE IF NOT EXISTS services (
    id                  UUID PRIMARY KEY,
    name                TEXT NOT NULL,
    description         TEXT,
    price               NUMERIC(12, 2) NOT NULL CHECK (price > 0),
    estimated_minutes   INTEGER CHECK (estimated_minutes IS NULL OR estimated_minutes >= 0),
    active              BOOLEAN NOT NULL DEFAULT TRUE,
    created_at          TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS services_name_key ON services (lower(name));

CREATE TABLE IF NOT EXISTS orders (
    id          UUID PRIMARY KEY,
    vehicle_id  UUID NOT NULL
                CONSTRAINT orders_vehicle_id_fkey REFERENCES vehicles (id) ON DELETE RESTRICT,
    employee_id UUID
                CONSTRAINT orders_employee_id_fkey REFERENCES employees (id) ON DELETE RESTRICT,
    state       TEXT NOT NULL
                CHECK (state IN ('pending', 'in_progress', 'completed', 'delivered')),
    entered_at  TIMESTAMPTZ NOT NULL,
    exited_at   TIMESTAMPTZ,
    mileage     INTEGER CHECK (mileage IS NULL OR mileage >= 0),
    notes       TEXT
);
CREATE INDEX IF NOT EXISTS orders_entered_at_idx ON orders (entered_at);
CREATE INDEX IF NOT EXISTS orders_employee_id_idx ON orders (employee_id);

CREATE TABLE IF NOT EXISTS order_line_items (
    seq         BIGSERIAL UNIQUE,
    id          UUID PRIMARY KEY,
    order_id    UUID NOT NULL
                CONSTRAINT order_line_items_order_id_fkey REFERENCES orders (id) ON DELETE CASCADE,
    service_id  UUID NOT NULL
                CONSTRAINT order_line_items_service_id_fkey REFERENCES services (id) ON DELETE RESTRICT,
    quantity    INTEGER NOT NULL CHECK (quantity > 0),
    unit_price  NUMERIC(12, 2) NOT NULL,
    subtotal    NUMERIC NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS order_line_items_order_id_idx ON order_line_items (order_id);

CREATE TABLE IF NOT EXISTS invoices (
    id              UUID PRIMARY KEY,
    order_id        UUID NOT NULL
                    CONSTRAINT invoices_order_id_key UNIQUE
                    CONSTRAINT invoices_order_id_fkey REFERENCES orders (id) ON DELETE RESTRICT,
    subtotal        NUMERIC NOT NULL,
    tax             NUMERIC NOT NULL,
    total           NUMERIC NOT NULL,
    payment_method  TEXT NOT NULL,
    issued_at       TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS invoices_issued_at_idx ON invoices (issued_at);
"#;

/// Postgres-backed [`ShopStore`].
#[derive(Debug, Clone)]
pub struct PostgresShopStore {
    pool: Arc<PgPool>,
}

impl PostgresShopStore {
    /// Create a new PostgresShopStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e, FkSide::Write))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e, FkSide::Write))?;
        Ok(())
    }

    async fn execute_one(
        &self,
        operation: &'static str,
        what: &'static str,
        side: FkSide,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> StoreResult<()> {
        let span = Span::current();
        span.record("operation", operation);

        let result = query
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e, side))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(what));
        }
        Ok(())
    }
}

/// Which end of a foreign key a statement sits on.
#[derive(Debug, Clone, Copy)]
enum FkSide {
    /// Insert/update of the referencing row.
    Write,
    /// Delete of the referenced row.
    Delete,
}

fn unique_constraint(name: &str) -> Option<Constraint> {
    Some(match name {
        "clients_phone_key" => Constraint::ClientPhone,
        "vehicles_plate_key" => Constraint::VehiclePlate,
        "vehicles_vin_key" => Constraint::VehicleVin,
        "employees_name_key" => Constraint::EmployeeName,
        "services_name_key" => Constraint::ServiceName,
        "invoices_order_id_key" => Constraint::InvoicePerOrder,
        _ => return None,
    })
}

/// Foreign key name -> (dependent that blocks a delete, referenced row name).
fn foreign_key(name: &str) -> Option<(Dependent, &'static str)> {
    Some(match name {
        "vehicles_client_id_fkey" => (Dependent::ClientVehicles, "client"),
        "orders_vehicle_id_fkey" => (Dependent::VehicleOrders, "vehicle"),
        "orders_employee_id_fkey" => (Dependent::EmployeeOrders, "employee"),
        "order_line_items_service_id_fkey" => (Dependent::ServiceLineItems, "service"),
        "invoices_order_id_fkey" => (Dependent::OrderInvoice, "order"),
        "order_line_items_order_id_fkey" => (Dependent::OrderInvoice, "order"),
        _ => return None,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error, side: FkSide) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            let constraint = db_err.constraint().unwrap_or_default();
            match db_err.code().as_deref() {
                Some("23505") => unique_constraint(constraint)
                    .map(StoreError::UniqueViolation)
                    .unwrap_or(StoreError::Backend(msg)),
                Some("23503") => match (foreign_key(constraint), side) {
                    (Some((dependent, _)), FkSide::Delete) => StoreError::Referenced(dependent),
                    (Some((_, target)), FkSide::Write) => StoreError::MissingReference(target),
                    (None, _) => StoreError::Backend(msg),
                },
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

/// `%q%` for ILIKE, with wildcards in `q` escaped.
fn like_pattern(search: Option<&str>) -> Option<String> {
    let q = search.map(str::trim).filter(|q| !q.is_empty())?;
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    Some(out)
}

fn limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn to_i32(v: Option<u32>) -> Option<i32> {
    v.map(|n| i32::try_from(n).unwrap_or(i32::MAX))
}

fn decode_u32(row: &PgRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    let v: Option<i32> = row.try_get(column)?;
    v.map(|n| {
        u32::try_from(n).map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
    .transpose()
}

fn decode_state(row: &PgRow) -> Result<OrderState, sqlx::Error> {
    let raw: String = row.try_get("state")?;
    OrderState::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: "state".to_string(),
        source: Box::new(e),
    })
}

// SQLx row types

struct ClientRow(Client);

impl<'r> FromRow<'r, PgRow> for ClientRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ClientRow(Client {
            id: ClientId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct VehicleRow(Vehicle);

impl<'r> FromRow<'r, PgRow> for VehicleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(VehicleRow(Vehicle {
            id: VehicleId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            make: row.try_get("make")?,
            model: row.try_get("model")?,
            year: row.try_get("year")?,
            color: row.try_get("color")?,
            plate: row.try_get("plate")?,
            vin: row.try_get("vin")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct EmployeeRow(Employee);

impl<'r> FromRow<'r, PgRow> for EmployeeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EmployeeRow(Employee {
            id: EmployeeId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            specialty: row.try_get("specialty")?,
            phone: row.try_get("phone")?,
            salary: row.try_get("salary")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct ServiceRow(Service);

impl<'r> FromRow<'r, PgRow> for ServiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ServiceRow(Service {
            id: ServiceId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            estimated_minutes: decode_u32(row, "estimated_minutes")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct OrderRow(Order);

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let employee_id: Option<Uuid> = row.try_get("employee_id")?;
        Ok(OrderRow(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            vehicle_id: VehicleId::from_uuid(row.try_get("vehicle_id")?),
            employee_id: employee_id.map(EmployeeId::from_uuid),
            state: decode_state(row)?,
            entered_at: row.try_get("entered_at")?,
            exited_at: row.try_get("exited_at")?,
            mileage: decode_u32(row, "mileage")?,
            notes: row.try_get("notes")?,
        }))
    }
}

struct LineItemRow(LineItem);

impl<'r> FromRow<'r, PgRow> for LineItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LineItemRow(LineItem {
            id: LineItemId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            service_id: ServiceId::from_uuid(row.try_get("service_id")?),
            quantity: decode_u32(row, "quantity")?.unwrap_or_default(),
            unit_price: row.try_get("unit_price")?,
            subtotal: row.try_get("subtotal")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct InvoiceRow(Invoice);

impl<'r> FromRow<'r, PgRow> for InvoiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InvoiceRow(Invoice {
            id: InvoiceId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            subtotal: row.try_get("subtotal")?,
            tax: row.try_get("tax")?,
            total: row.try_get("total")?,
            payment_method: row.try_get("payment_method")?,
            issued_at: row.try_get("issued_at")?,
        }))
    }
}

const CLIENT_COLUMNS: &str = "id, name, phone, email, address, created_at";
const VEHICLE_COLUMNS: &str =
    "id, client_id, make, model, year, color, plate, vin, created_at";
const EMPLOYEE_COLUMNS: &str = "id, name, specialty, phone, salary, active, created_at";
const SERVICE_COLUMNS: &str =
    "id, name, description, price, estimated_minutes, active, created_at";
const ORDER_COLUMNS: &str =
    "id, vehicle_id, employee_id, state, entered_at, exited_at, mileage, notes";
const INVOICE_COLUMNS: &str =
    "id, order_id, subtotal, tax, total, payment_method, issued_at";

const INSERT_LINE_ITEM: &str = r#"
    INSERT INTO order_line_items (id, order_id, service_id, quantity, unit_price, subtotal, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

fn bind_line_item<'q>(
    line: &'q LineItem,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_LINE_ITEM)
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line.service_id.as_uuid())
        .bind(to_i32(Some(line.quantity)))
        .bind(line.unit_price)
        .bind(line.subtotal)
        .bind(line.created_at)
}

#[async_trait]
impl ShopStore for PostgresShopStore {
    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name, phone, email, address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(client.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let q = sqlx::query(
            r#"
            UPDATE clients SET name = $2, phone = $3, email = $4, address = $5
            WHERE id = $1
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address);
        self.execute_one("update_client", "client", FkSide::Write, q).await
    }

    async fn get_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_client", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_clients(&self, query: &CatalogQuery) -> StoreResult<Vec<Client>> {
        let sql = format!(
            r#"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE ($1::text IS NULL OR name ILIKE $1 OR phone ILIKE $1 OR email ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(like_pattern(query.search.as_deref()))
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_clients", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM clients WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_client", "client", FkSide::Delete, q).await
    }

    #[instrument(skip(self, vehicle), fields(vehicle_id = %vehicle.id), err)]
    async fn insert_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, client_id, make, model, year, color, plate, vin, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(vehicle.id.as_uuid())
        .bind(vehicle.client_id.as_uuid())
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.color)
        .bind(&vehicle.plate)
        .bind(&vehicle.vin)
        .bind(vehicle.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_vehicle", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, vehicle), fields(vehicle_id = %vehicle.id), err)]
    async fn update_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let q = sqlx::query(
            r#"
            UPDATE vehicles
            SET client_id = $2, make = $3, model = $4, year = $5, color = $6, plate = $7, vin = $8
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id.as_uuid())
        .bind(vehicle.client_id.as_uuid())
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.color)
        .bind(&vehicle.plate)
        .bind(&vehicle.vin);
        self.execute_one("update_vehicle", "vehicle", FkSide::Write, q).await
    }

    async fn get_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1");
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_vehicle", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_vehicles(&self, query: &CatalogQuery) -> StoreResult<Vec<Vehicle>> {
        let sql = format!(
            r#"
            SELECT {VEHICLE_COLUMNS} FROM vehicles
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::text IS NULL OR plate ILIKE $2 OR make ILIKE $2 OR model ILIKE $2 OR vin ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(query.client_id.map(Uuid::from))
            .bind(like_pattern(query.search.as_deref()))
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_vehicles", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(vehicle_id = %id), err)]
    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM vehicles WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_vehicle", "vehicle", FkSide::Delete, q).await
    }

    #[instrument(skip(self, employee), fields(employee_id = %employee.id), err)]
    async fn insert_employee(&self, employee: &Employee) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, name, specialty, phone, salary, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(employee.id.as_uuid())
        .bind(&employee.name)
        .bind(&employee.specialty)
        .bind(&employee.phone)
        .bind(employee.salary)
        .bind(employee.active)
        .bind(employee.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_employee", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, employee), fields(employee_id = %employee.id), err)]
    async fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        let q = sqlx::query(
            r#"
            UPDATE employees
            SET name = $2, specialty = $3, phone = $4, salary = $5, active = $6
            WHERE id = $1
            "#,
        )
        .bind(employee.id.as_uuid())
        .bind(&employee.name)
        .bind(&employee.specialty)
        .bind(&employee.phone)
        .bind(employee.salary)
        .bind(employee.active);
        self.execute_one("update_employee", "employee", FkSide::Write, q).await
    }

    async fn get_employee(&self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1");
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_employee", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_employees(&self, query: &CatalogQuery) -> StoreResult<Vec<Employee>> {
        let sql = format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE ($1::boolean IS NULL OR active = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR specialty ILIKE $2 OR phone ILIKE $2)
            ORDER BY lower(name)
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(query.active)
            .bind(like_pattern(query.search.as_deref()))
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_employees", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(employee_id = %id), err)]
    async fn delete_employee(&self, id: EmployeeId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM employees WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_employee", "employee", FkSide::Delete, q).await
    }

    #[instrument(skip(self, service), fields(service_id = %service.id), err)]
    async fn insert_service(&self, service: &Service) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO services (id, name, description, price, estimated_minutes, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price)
        .bind(to_i32(service.estimated_minutes))
        .bind(service.active)
        .bind(service.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_service", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, service), fields(service_id = %service.id), err)]
    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        let q = sqlx::query(
            r#"
            UPDATE services
            SET name = $2, description = $3, price = $4, estimated_minutes = $5, active = $6
            WHERE id = $1
            "#,
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price)
        .bind(to_i32(service.estimated_minutes))
        .bind(service.active);
        self.execute_one("update_service", "service", FkSide::Write, q).await
    }

    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1");
        let row = sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_service", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn get_services(&self, ids: &[ServiceId]) -> StoreResult<Vec<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ANY($1)");
        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(ids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_services", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn list_services(&self, query: &CatalogQuery) -> StoreResult<Vec<Service>> {
        let sql = format!(
            r#"
            SELECT {SERVICE_COLUMNS} FROM services
            WHERE ($1::boolean IS NULL OR active = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
            ORDER BY lower(name)
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(query.active)
            .bind(like_pattern(query.search.as_deref()))
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_services", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(service_id = %id), err)]
    async fn delete_service(&self, id: ServiceId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM services WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_service", "service", FkSide::Delete, q).await
    }

    #[instrument(skip(self, order, lines), fields(order_id = %order.id, line_count = lines.len()), err)]
    async fn insert_order(&self, order: &Order, lines: &[LineItem]) -> StoreResult<()> {
        let span = Span::current();
        span.record("operation", "insert_order");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, FkSide::Write))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, vehicle_id, employee_id, state, entered_at, exited_at, mileage, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.vehicle_id.as_uuid())
        .bind(order.employee_id.map(Uuid::from))
        .bind(order.state.as_str())
        .bind(order.entered_at)
        .bind(order.exited_at)
        .bind(to_i32(order.mileage))
        .bind(&order.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e, FkSide::Write))?;

        for line in lines {
            bind_line_item(line)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_line_item", e, FkSide::Write))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, state = %order.state), err)]
    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let q = sqlx::query(
            r#"
            UPDATE orders
            SET vehicle_id = $2, employee_id = $3, state = $4, exited_at = $5, mileage = $6, notes = $7
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.vehicle_id.as_uuid())
        .bind(order.employee_id.map(Uuid::from))
        .bind(order.state.as_str())
        .bind(order.exited_at)
        .bind(to_i32(order.mileage))
        .bind(&order.notes);
        self.execute_one("update_order", "order", FkSide::Write, q).await
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ($1::text IS NULL OR state = $1)
              AND ($2::uuid IS NULL OR vehicle_id = $2)
              AND ($3::uuid IS NULL OR employee_id = $3)
            ORDER BY entered_at DESC
            LIMIT $4
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(query.state.map(OrderState::as_str))
            .bind(query.vehicle_id.map(Uuid::from))
            .bind(query.employee_id.map(Uuid::from))
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn line_items(&self, order_id: OrderId) -> StoreResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT id, order_id, service_id, quantity, unit_price, subtotal, created_at
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY seq
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("line_items", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, line), fields(order_id = %line.order_id, service_id = %line.service_id), err)]
    async fn append_line_item(&self, line: &LineItem) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, FkSide::Write))?;

        // Row lock serializes against concurrent state changes of the order.
        let row = sqlx::query("SELECT state FROM orders WHERE id = $1 FOR UPDATE")
            .bind(line.order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e, FkSide::Write))?;
        let Some(row) = row else {
            return Err(StoreError::MissingReference("order"));
        };
        let state = decode_state(&row).map_err(|e| map_sqlx_error("lock_order", e, FkSide::Write))?;
        if !state.accepts_line_items() {
            return Err(StoreError::OrderClosed(line.order_id));
        }

        bind_line_item(line)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("append_line_item", e, FkSide::Write))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, FkSide::Write))?;
        Ok(())
    }

    /// Line items go with the order through `ON DELETE CASCADE`, in the same statement.
    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_order", "order", FkSide::Delete, q).await
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, order_id = %invoice.order_id), err)]
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, FkSide::Write))?;

        // Same row lock as `append_line_item`: the state cannot move under us.
        let row = sqlx::query("SELECT state FROM orders WHERE id = $1 FOR UPDATE")
            .bind(invoice.order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e, FkSide::Write))?;
        let Some(row) = row else {
            return Err(StoreError::MissingReference("order"));
        };
        let state = decode_state(&row).map_err(|e| map_sqlx_error("lock_order", e, FkSide::Write))?;
        if !state.is_billable() {
            return Err(StoreError::OrderNotBillable(invoice.order_id));
        }

        sqlx::query(
            r#"
            INSERT INTO invoices (id, order_id, subtotal, tax, total, payment_method, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.order_id.as_uuid())
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total)
        .bind(&invoice.payment_method)
        .bind(invoice.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e, FkSide::Write))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, FkSide::Write))?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id), err)]
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let q = sqlx::query("UPDATE invoices SET payment_method = $2 WHERE id = $1")
            .bind(invoice.id.as_uuid())
            .bind(&invoice.payment_method);
        self.execute_one("update_invoice", "invoice", FkSide::Write, q).await
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_invoice", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn invoice_for_order(&self, order_id: OrderId) -> StoreResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = $1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("invoice_for_order", e, FkSide::Write))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_invoices(&self, query: &InvoiceQuery) -> StoreResult<Vec<Invoice>> {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE ($1::timestamptz IS NULL OR (issued_at >= $1 AND issued_at < $2))
              AND ($3::text IS NULL OR lower(payment_method) = lower($3))
            ORDER BY issued_at DESC
            LIMIT $4
            "#
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(query.issued.map(|r| r.start))
            .bind(query.issued.map(|r| r.end))
            .bind(&query.payment_method)
            .bind(limit(query.limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invoices", e, FkSide::Write))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()> {
        let q = sqlx::query("DELETE FROM invoices WHERE id = $1").bind(id.as_uuid());
        self.execute_one("delete_invoice", "invoice", FkSide::Delete, q).await
    }

    async fn entity_counts(&self) -> StoreResult<EntityCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM clients) AS clients,
                (SELECT COUNT(*) FROM vehicles) AS vehicles,
                (SELECT COUNT(*) FROM employees WHERE active) AS active_employees,
                (SELECT COUNT(*) FROM services WHERE active) AS active_services
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entity_counts", e, FkSide::Write))?;

        let count = |column: &str| -> StoreResult<u64> {
            let n: i64 = row
                .try_get(column)
                .map_err(|e| map_sqlx_error("entity_counts", e, FkSide::Write))?;
            Ok(n.max(0) as u64)
        };

        Ok(EntityCounts {
            clients: count("clients")?,
            vehicles: count("vehicles")?,
            active_employees: count("active_employees")?,
            active_services: count("active_services")?,
            orders: self.order_state_counts(None).await?,
        })
    }

    async fn order_state_counts(&self, employee_id: Option<EmployeeId>) -> StoreResult<StateCounts> {
        let rows = sqlx::query(
            r#"
            SELECT state, COUNT(*) AS n FROM orders
            WHERE ($1::uuid IS NULL OR employee_id = $1)
            GROUP BY state
            "#,
        )
        .bind(employee_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_state_counts", e, FkSide::Write))?;

        let mut counts = StateCounts::default();
        for row in rows {
            let state =
                decode_state(&row).map_err(|e| map_sqlx_error("order_state_counts", e, FkSide::Write))?;
            let n: i64 = row
                .try_get("n")
                .map_err(|e| map_sqlx_error("order_state_counts", e, FkSide::Write))?;
            counts.add(state, n.max(0) as u64);
        }
        Ok(counts)
    }

    async fn completed_orders_by_employee(
        &self,
        entered: TimeRange,
    ) -> StoreResult<HashMap<EmployeeId, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT employee_id, COUNT(*) AS n FROM orders
            WHERE state = 'completed'
              AND employee_id IS NOT NULL
              AND entered_at >= $1 AND entered_at < $2
            GROUP BY employee_id
            "#,
        )
        .bind(entered.start)
        .bind(entered.end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("completed_orders_by_employee", e, FkSide::Write))?;

        let mut out = HashMap::with_capacity(rows.len());
        let decode = |row: &PgRow| -> Result<(Uuid, i64), sqlx::Error> {
            Ok((row.try_get("employee_id")?, row.try_get("n")?))
        };
        for row in rows {
            let (id, n) = decode(&row)
                .map_err(|e| map_sqlx_error("completed_orders_by_employee", e, FkSide::Write))?;
            out.insert(EmployeeId::from_uuid(id), n.max(0) as u64);
        }
        Ok(out)
    }

    fn invoices_issued(&self, range: TimeRange) -> BoxStream<'_, StoreResult<Invoice>> {
        sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, order_id, subtotal, tax, total, payment_method, issued_at
            FROM invoices
            WHERE issued_at >= $1 AND issued_at < $2
            ORDER BY issued_at ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch(&*self.pool)
        .map(|r| {
            r.map(|row| row.0)
                .map_err(|e| map_sqlx_error("invoices_issued", e, FkSide::Write))
        })
        .boxed()
    }

    fn line_item_stream(&self, entered: Option<TimeRange>) -> BoxStream<'_, StoreResult<LineItem>> {
        let start: Option<DateTime<Utc>> = entered.map(|r| r.start);
        let end: Option<DateTime<Utc>> = entered.map(|r| r.end);
        sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT li.id, li.order_id, li.service_id, li.quantity, li.unit_price, li.subtotal, li.created_at
            FROM order_line_items li
            JOIN orders o ON o.id = li.order_id
            WHERE $1::timestamptz IS NULL OR (o.entered_at >= $1 AND o.entered_at < $2)
            ORDER BY li.seq
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch(&*self.pool)
        .map(|r| {
            r.map(|row| row.0)
                .map_err(|e| map_sqlx_error("line_item_stream", e, FkSide::Write))
        })
        .boxed()
    }
}
