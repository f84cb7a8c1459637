use autoshop_auth::{Principal, Role, permissions_for_roles};
use autoshop_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the auth middleware; permissions are resolved from the roles
/// once, here, so handlers only pass the principal along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal_id: UserId, roles: Vec<Role>) -> Self {
        Self {
            principal: Principal::from_roles(principal_id, roles),
        }
    }

    pub fn principal_id(&self) -> UserId {
        self.principal.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_auth::Permission;

    #[test]
    fn permissions_follow_roles() {
        let staff = PrincipalContext::new(UserId::new(), vec![Role::staff()]);
        assert!(staff.principal().permissions.contains(&Permission::ORDERS_WRITE));
        assert!(!staff.principal().permissions.contains(&Permission::ORDERS_DELETE));

        let viewer = PrincipalContext::new(UserId::new(), vec![Role::new("viewer")]);
        assert!(viewer.principal().permissions.is_empty());
        assert_eq!(viewer.roles()[0].as_str(), "viewer");
        assert_eq!(viewer.principal().permissions, permissions_for_roles(viewer.roles()));
    }
}
