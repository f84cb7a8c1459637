use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use autoshop_core::{DomainError, DomainResult, EmployeeId, Entity, Money, optional_text, required_text};

use crate::contains_ci;

/// A mechanic or other staff member orders can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    /// Unique case-insensitively (see [`Employee::name_key`]).
    pub name: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub salary: Option<Money>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Employee {
    type Id = EmployeeId;

    fn id(&self) -> EmployeeId {
        self.id
    }
}

impl Employee {
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Only active employees may be put on an order.
    pub fn ensure_assignable(&self) -> DomainResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(DomainError::precondition(format!(
                "employee '{}' is inactive",
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
            || self.specialty.as_deref().is_some_and(|s| contains_ci(s, &q))
            || self.phone.as_deref().is_some_and(|p| contains_ci(p, &q))
    }
}

fn validate_salary(salary: Option<Money>) -> DomainResult<Option<Money>> {
    match salary {
        Some(s) if s < Decimal::ZERO => Err(DomainError::invalid("salary must not be negative")),
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub salary: Option<Money>,
}

impl NewEmployee {
    pub fn into_employee(self, id: EmployeeId, now: DateTime<Utc>) -> DomainResult<Employee> {
        Ok(Employee {
            id,
            name: required_text("name", &self.name)?,
            specialty: optional_text(self.specialty.as_deref()),
            phone: optional_text(self.phone.as_deref()),
            salary: validate_salary(self.salary)?,
            active: true,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub salary: Option<Money>,
    pub active: Option<bool>,
}

impl EmployeePatch {
    pub fn apply(&self, employee: &mut Employee) -> DomainResult<()> {
        if let Some(name) = &self.name {
            employee.name = required_text("name", name)?;
        }
        if let Some(specialty) = &self.specialty {
            employee.specialty = optional_text(Some(specialty));
        }
        if let Some(phone) = &self.phone {
            employee.phone = optional_text(Some(phone));
        }
        if self.salary.is_some() {
            employee.salary = validate_salary(self.salary)?;
        }
        if let Some(active) = self.active {
            employee.active = active;
        }
        Ok(())
    }
}
