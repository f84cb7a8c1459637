use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use autoshop_auth::{Permission, Principal};
use autoshop_catalog::{
    Client, ClientPatch, Employee, EmployeePatch, NewClient, NewEmployee, NewService, NewVehicle,
    Service, ServicePatch, Vehicle, VehiclePatch,
};
use autoshop_core::{ClientId, Clock, EmployeeId, ServiceId, VehicleId};

use super::{ServiceResult, found, require};
use crate::store::{CatalogQuery, ShopStore};

/// A client with the vehicles they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDetails {
    #[serde(flatten)]
    pub client: Client,
    pub vehicles: Vec<Vehicle>,
}

/// Clients, vehicles, employees and services.
///
/// Uniqueness and "has dependents" rules are left to the store's constraints;
/// violations come back as `Conflict` / `PreconditionFailed`.
pub struct CatalogService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> CatalogService<S>
where
    S: ShopStore + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // clients

    pub async fn create_client(&self, actor: &Principal, input: NewClient) -> ServiceResult<Client> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let client = input.into_client(ClientId::new(), self.clock.now())?;
        self.store.insert_client(&client).await?;
        info!(client_id = %client.id, actor = %actor.principal_id, "client created");
        Ok(client)
    }

    pub async fn get_client(&self, id: ClientId) -> ServiceResult<ClientDetails> {
        let client = found(self.store.get_client(id).await?, "client", id)?;
        let vehicles = self
            .store
            .list_vehicles(&CatalogQuery {
                client_id: Some(id),
                ..Default::default()
            })
            .await?;
        Ok(ClientDetails { client, vehicles })
    }

    pub async fn list_clients(&self, query: &CatalogQuery) -> ServiceResult<Vec<Client>> {
        debug!(search = ?query.search, "listing clients");
        Ok(self.store.list_clients(query).await?)
    }

    pub async fn update_client(
        &self,
        actor: &Principal,
        id: ClientId,
        patch: ClientPatch,
    ) -> ServiceResult<Client> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let mut client = found(self.store.get_client(id).await?, "client", id)?;
        patch.apply(&mut client)?;
        self.store.update_client(&client).await?;
        info!(client_id = %id, actor = %actor.principal_id, "client updated");
        Ok(client)
    }

    pub async fn delete_client(&self, actor: &Principal, id: ClientId) -> ServiceResult<()> {
        require(actor, &Permission::CATALOG_DELETE)?;
        self.store.delete_client(id).await?;
        info!(client_id = %id, actor = %actor.principal_id, "client deleted");
        Ok(())
    }

    // vehicles

    pub async fn create_vehicle(&self, actor: &Principal, input: NewVehicle) -> ServiceResult<Vehicle> {
        require(actor, &Permission::CATALOG_WRITE)?;
        found(self.store.get_client(input.client_id).await?, "client", input.client_id)?;
        let vehicle = input.into_vehicle(VehicleId::new(), self.clock.now())?;
        self.store.insert_vehicle(&vehicle).await?;
        info!(vehicle_id = %vehicle.id, client_id = %vehicle.client_id, actor = %actor.principal_id, "vehicle created");
        Ok(vehicle)
    }

    pub async fn get_vehicle(&self, id: VehicleId) -> ServiceResult<Vehicle> {
        found(self.store.get_vehicle(id).await?, "vehicle", id)
    }

    /// Set `query.client_id` to list one client's vehicles.
    pub async fn list_vehicles(&self, query: &CatalogQuery) -> ServiceResult<Vec<Vehicle>> {
        Ok(self.store.list_vehicles(query).await?)
    }

    pub async fn update_vehicle(
        &self,
        actor: &Principal,
        id: VehicleId,
        patch: VehiclePatch,
    ) -> ServiceResult<Vehicle> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let mut vehicle = found(self.store.get_vehicle(id).await?, "vehicle", id)?;
        if let Some(client_id) = patch.client_id {
            found(self.store.get_client(client_id).await?, "client", client_id)?;
        }
        patch.apply(&mut vehicle, self.clock.now())?;
        self.store.update_vehicle(&vehicle).await?;
        info!(vehicle_id = %id, actor = %actor.principal_id, "vehicle updated");
        Ok(vehicle)
    }

    pub async fn delete_vehicle(&self, actor: &Principal, id: VehicleId) -> ServiceResult<()> {
        require(actor, &Permission::CATALOG_DELETE)?;
        self.store.delete_vehicle(id).await?;
        info!(vehicle_id = %id, actor = %actor.principal_id, "vehicle deleted");
        Ok(())
    }

    // employees

    pub async fn create_employee(
        &self,
        actor: &Principal,
        input: NewEmployee,
    ) -> ServiceResult<Employee> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let employee = input.into_employee(EmployeeId::new(), self.clock.now())?;
        self.store.insert_employee(&employee).await?;
        info!(employee_id = %employee.id, actor = %actor.principal_id, "employee created");
        Ok(employee)
    }

    pub async fn get_employee(&self, id: EmployeeId) -> ServiceResult<Employee> {
        found(self.store.get_employee(id).await?, "employee", id)
    }

    pub async fn list_employees(&self, query: &CatalogQuery) -> ServiceResult<Vec<Employee>> {
        Ok(self.store.list_employees(query).await?)
    }

    pub async fn update_employee(
        &self,
        actor: &Principal,
        id: EmployeeId,
        patch: EmployeePatch,
    ) -> ServiceResult<Employee> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let mut employee = found(self.store.get_employee(id).await?, "employee", id)?;
        patch.apply(&mut employee)?;
        self.store.update_employee(&employee).await?;
        info!(employee_id = %id, active = employee.active, actor = %actor.principal_id, "employee updated");
        Ok(employee)
    }

    /// Flip the active flag.
    pub async fn toggle_employee(&self, actor: &Principal, id: EmployeeId) -> ServiceResult<Employee> {
        let current = self.get_employee(id).await?;
        let patch = EmployeePatch {
            active: Some(!current.active),
            ..Default::default()
        };
        self.update_employee(actor, id, patch).await
    }

    pub async fn delete_employee(&self, actor: &Principal, id: EmployeeId) -> ServiceResult<()> {
        require(actor, &Permission::CATALOG_DELETE)?;
        self.store.delete_employee(id).await?;
        info!(employee_id = %id, actor = %actor.principal_id, "employee deleted");
        Ok(())
    }

    // services

    pub async fn create_service(&self, actor: &Principal, input: NewService) -> ServiceResult<Service> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let service = input.into_service(ServiceId::new(), self.clock.now())?;
        self.store.insert_service(&service).await?;
        info!(service_id = %service.id, price = %service.price, actor = %actor.principal_id, "service created");
        Ok(service)
    }

    pub async fn get_service(&self, id: ServiceId) -> ServiceResult<Service> {
        found(self.store.get_service(id).await?, "service", id)
    }

    pub async fn list_services(&self, query: &CatalogQuery) -> ServiceResult<Vec<Service>> {
        Ok(self.store.list_services(query).await?)
    }

    pub async fn update_service(
        &self,
        actor: &Principal,
        id: ServiceId,
        patch: ServicePatch,
    ) -> ServiceResult<Service> {
        require(actor, &Permission::CATALOG_WRITE)?;
        let mut service = found(self.store.get_service(id).await?, "service", id)?;
        patch.apply(&mut service)?;
        self.store.update_service(&service).await?;
        info!(service_id = %id, active = service.active, actor = %actor.principal_id, "service updated");
        Ok(service)
    }

    pub async fn toggle_service(&self, actor: &Principal, id: ServiceId) -> ServiceResult<Service> {
        let current = self.get_service(id).await?;
        let patch = ServicePatch {
            active: Some(!current.active),
            ..Default::default()
        };
        self.update_service(actor, id, patch).await
    }

    pub async fn delete_service(&self, actor: &Principal, id: ServiceId) -> ServiceResult<()> {
        require(actor, &Permission::CATALOG_DELETE)?;
        self.store.delete_service(id).await?;
        info!(service_id = %id, actor = %actor.principal_id, "service deleted");
        Ok(())
    }
}
