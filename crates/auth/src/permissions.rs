use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.write"). The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    /// Create/update clients, vehicles, employees and services.
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));
    pub const CATALOG_DELETE: Permission = Permission(Cow::Borrowed("catalog.delete"));
    pub const ORDERS_WRITE: Permission = Permission(Cow::Borrowed("orders.write"));
    pub const ORDERS_DELETE: Permission = Permission(Cow::Borrowed("orders.delete"));
    pub const INVOICES_WRITE: Permission = Permission(Cow::Borrowed("invoices.write"));
    pub const INVOICES_DELETE: Permission = Permission(Cow::Borrowed("invoices.delete"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
