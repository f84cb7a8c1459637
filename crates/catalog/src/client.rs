use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autoshop_core::{ClientId, DomainError, DomainResult, Entity, optional_text, required_text};

use crate::contains_ci;

/// A vehicle owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    /// Unique across clients (trimmed).
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> ClientId {
        self.id
    }
}

impl Client {
    /// Case-insensitive match over name, phone and email.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        contains_ci(&self.name, &q)
            || contains_ci(&self.phone, &q)
            || self.email.as_deref().is_some_and(|e| contains_ci(e, &q))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl NewClient {
    pub fn into_client(self, id: ClientId, now: DateTime<Utc>) -> DomainResult<Client> {
        let email = optional_text(self.email.as_deref());
        if let Some(e) = &email {
            validate_email(e)?;
        }
        Ok(Client {
            id,
            name: required_text("name", &self.name)?,
            phone: required_text("phone", &self.phone)?,
            email,
            address: optional_text(self.address.as_deref()),
            created_at: now,
        })
    }
}

/// Partial update. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl ClientPatch {
    pub fn apply(&self, client: &mut Client) -> DomainResult<()> {
        if let Some(name) = &self.name {
            client.name = required_text("name", name)?;
        }
        if let Some(phone) = &self.phone {
            client.phone = required_text("phone", phone)?;
        }
        if let Some(email) = &self.email {
            let email = optional_text(Some(email));
            if let Some(e) = &email {
                validate_email(e)?;
            }
            client.email = email;
        }
        if let Some(address) = &self.address {
            client.address = optional_text(Some(address));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> DomainResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DomainError::invalid(format!("email '{email}' is not valid"))),
    }
}
