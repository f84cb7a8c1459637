//! `autoshop-catalog`: the shop's reference data.
//!
//! Clients own vehicles; employees and services are assigned to and billed on
//! orders. Types here validate and normalize their own input; uniqueness and
//! "has dependents" rules need storage and are enforced by the infra layer.

pub mod client;
pub mod employee;
pub mod service;
pub mod vehicle;

pub use client::{Client, ClientPatch, NewClient};
pub use employee::{Employee, EmployeePatch, NewEmployee};
pub use service::{MAX_PRICE, NewService, Service, ServicePatch};
pub use vehicle::{NewVehicle, Vehicle, VehiclePatch, normalize_plate, normalize_vin};

/// Case-insensitive substring match used by every catalog search.
pub(crate) fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
