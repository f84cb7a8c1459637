//! Application services.
//!
//! Each service composes a [`ShopStore`] with the pure domain crates: resolve
//! references, run the domain rule, write, and translate whatever the store
//! reports into the domain taxonomy. Mutations take the acting [`Principal`]
//! and check a named permission before touching the store.
//!
//! Error translation:
//!
//! | StoreError | ServiceError |
//! |------------|--------------|
//! | `UniqueViolation` | `Domain(Conflict)` |
//! | `Referenced` | `Domain(PreconditionFailed)` |
//! | `NotFound` / `MissingReference` | `Domain(NotFound)` |
//! | `OrderClosed` / `OrderNotBillable` | `Domain(PreconditionFailed)` |
//! | `Backend` | `Store` |

use std::fmt::Display;

use thiserror::Error;

use autoshop_auth::{AuthzError, Permission, Principal, authorize};
use autoshop_core::DomainError;

use crate::store::StoreError;

pub mod analytics;
pub mod catalog;
pub mod invoices;
pub mod orders;

pub use analytics::{AnalyticsService, TopServicesQuery};
pub use catalog::{CatalogService, ClientDetails};
pub use invoices::InvoiceService;
pub use orders::{OrderDetails, OrderService};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure failure; nothing the caller can fix.
    #[error("storage failure: {0}")]
    Store(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.code(),
            ServiceError::Store(_) => "internal",
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation(c) => DomainError::conflict(c.describe()).into(),
            StoreError::Referenced(d) => DomainError::precondition(d.describe()).into(),
            StoreError::NotFound(what) | StoreError::MissingReference(what) => {
                DomainError::not_found(what).into()
            }
            StoreError::OrderClosed(id) => DomainError::precondition(format!(
                "order {id} is completed or delivered and no longer accepts line items"
            ))
            .into(),
            StoreError::OrderNotBillable(id) => DomainError::precondition(format!(
                "order {id} must be completed or delivered to be invoiced"
            ))
            .into(),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(permission) => {
                DomainError::unauthorized(format!("missing permission '{permission}'")).into()
            }
        }
    }
}

pub(crate) fn require(actor: &Principal, permission: &Permission) -> ServiceResult<()> {
    authorize(actor, permission)?;
    Ok(())
}

/// `Some(row)` or `NotFound("<what> <id>")`.
pub(crate) fn found<T>(row: Option<T>, what: &str, id: impl Display) -> ServiceResult<T> {
    row.ok_or_else(|| DomainError::not_found(format!("{what} {id}")).into())
}
