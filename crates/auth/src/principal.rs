use autoshop_core::UserId;

use crate::{Permission, Role, permissions_for_roles};

/// A fully resolved principal for authorization decisions.
///
/// Services take this as the acting identity for every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from roles with the shop's role policy.
    pub fn from_roles(principal_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            principal_id,
            roles,
            permissions,
        }
    }

    /// Internal actor for jobs and tests.
    pub fn system() -> Self {
        Self::from_roles(UserId::new(), vec![Role::admin()])
    }
}
