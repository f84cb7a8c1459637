use thiserror::Error;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Role → permission policy.
///
/// - `admin`: everything
/// - `staff`: every write except deletes
/// - anything else: read-only (no permissions; reads only need authentication)
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    if roles.iter().any(|r| r.as_str() == Role::STAFF) {
        return vec![
            Permission::CATALOG_WRITE,
            Permission::ORDERS_WRITE,
            Permission::INVOICES_WRITE,
        ];
    }

    Vec::new()
}
