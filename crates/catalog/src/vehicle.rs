use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use autoshop_core::{ClientId, DomainError, DomainResult, Entity, VehicleId, optional_text, required_text};

use crate::contains_ci;

const MIN_YEAR: i32 = 1900;

/// A vehicle, owned by exactly one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub client_id: ClientId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
    /// Normalized (trimmed, upper-case); globally unique.
    pub plate: String,
    /// Normalized like the plate; unique when present.
    pub vin: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Vehicle {
    type Id = VehicleId;

    fn id(&self) -> VehicleId {
        self.id
    }
}

impl Vehicle {
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        contains_ci(&self.plate, &q)
            || contains_ci(&self.make, &q)
            || contains_ci(&self.model, &q)
            || self.vin.as_deref().is_some_and(|v| contains_ci(v, &q))
    }
}

pub fn normalize_plate(plate: &str) -> DomainResult<String> {
    Ok(required_text("plate", plate)?.to_uppercase())
}

pub fn normalize_vin(vin: Option<&str>) -> Option<String> {
    optional_text(vin).map(|v| v.to_uppercase())
}

fn validate_year(year: i32, now: DateTime<Utc>) -> DomainResult<i32> {
    let max = now.year() + 1;
    if (MIN_YEAR..=max).contains(&year) {
        Ok(year)
    } else {
        Err(DomainError::invalid(format!(
            "year must be between {MIN_YEAR} and {max}"
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub client_id: ClientId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
    pub plate: String,
    pub vin: Option<String>,
}

impl NewVehicle {
    pub fn into_vehicle(self, id: VehicleId, now: DateTime<Utc>) -> DomainResult<Vehicle> {
        Ok(Vehicle {
            id,
            client_id: self.client_id,
            make: required_text("make", &self.make)?,
            model: required_text("model", &self.model)?,
            year: validate_year(self.year, now)?,
            color: optional_text(self.color.as_deref()),
            plate: normalize_plate(&self.plate)?,
            vin: normalize_vin(self.vin.as_deref()),
            created_at: now,
        })
    }
}

/// Partial update. Ownership (`client_id`) can be transferred.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    pub client_id: Option<ClientId>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub plate: Option<String>,
    pub vin: Option<String>,
}

impl VehiclePatch {
    pub fn apply(&self, vehicle: &mut Vehicle, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(client_id) = self.client_id {
            vehicle.client_id = client_id;
        }
        if let Some(make) = &self.make {
            vehicle.make = required_text("make", make)?;
        }
        if let Some(model) = &self.model {
            vehicle.model = required_text("model", model)?;
        }
        if let Some(year) = self.year {
            vehicle.year = validate_year(year, now)?;
        }
        if let Some(color) = &self.color {
            vehicle.color = optional_text(Some(color));
        }
        if let Some(plate) = &self.plate {
            vehicle.plate = normalize_plate(plate)?;
        }
        if let Some(vin) = &self.vin {
            vehicle.vin = normalize_vin(Some(vin));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn new_vehicle() -> NewVehicle {
        NewVehicle {
            client_id: ClientId::new(),
            make: "Toyota".into(),
            model: "Corolla".into(),
            year: 2018,
            color: None,
            plate: " abc-123 ".into(),
            vin: Some(" 1hgcm82633a004352 ".into()),
        }
    }

    #[test]
    fn plate_and_vin_are_trimmed_and_uppercased() {
        let v = new_vehicle().into_vehicle(VehicleId::new(), now()).unwrap();
        assert_eq!(v.plate, "ABC-123");
        assert_eq!(v.vin.as_deref(), Some("1HGCM82633A004352"));
    }

    #[test]
    fn blank_vin_is_absent() {
        let mut input = new_vehicle();
        input.vin = Some("  ".into());
        let v = input.into_vehicle(VehicleId::new(), now()).unwrap();
        assert_eq!(v.vin, None);
    }

    #[test]
    fn year_outside_range_is_rejected() {
        let mut input = new_vehicle();
        input.year = 2026;
        assert!(matches!(
            input.into_vehicle(VehicleId::new(), now()),
            Err(DomainError::InvalidInput(_))
        ));

        let mut input = new_vehicle();
        input.year = 2025;
        assert!(input.into_vehicle(VehicleId::new(), now()).is_ok());
    }

    #[test]
    fn patch_normalizes_plate() {
        let mut v = new_vehicle().into_vehicle(VehicleId::new(), now()).unwrap();
        VehiclePatch {
            plate: Some("xyz 9".into()),
            ..Default::default()
        }
        .apply(&mut v, now())
        .unwrap();
        assert_eq!(v.plate, "XYZ 9");
        assert!(v.matches("xyz"));
    }
}
