use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub u64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_logged_in_at: DateTime<Utc>,
}

impl Customer {
    /// Builds a freshly inserted record. The last-login timestamp starts at creation time.
    pub fn new(id: CustomerId, create: CustomerCreate, now: DateTime<Utc>) -> Self {
        Self { id, name: create.name, created_at: now, last_logged_in_at: now }
    }

    /// Returns a copy with the present fields of `update` applied.
    pub fn patched(&self, update: &CustomerUpdate) -> Self {
        let mut next = self.clone();
        if let Some(name) = &update.name {
            next.name = name.clone();
        }
        next
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCreate {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Optional search constraints. Every present field must hold; an empty criteria matches all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFindCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logged_in_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logged_in_after: Option<DateTime<Utc>>,
}

impl CustomerFindCriteria {
    pub fn matches(&self, customer: &Customer) -> bool {
        let name_ok = self
            .name_starts_with
            .as_deref()
            .map_or(true, |prefix| customer.name.starts_with(prefix));

        name_ok
            && self.created_before.map_or(true, |bound| customer.created_at < bound)
            && self.created_after.map_or(true, |bound| customer.created_at > bound)
            && self.last_logged_in_before.map_or(true, |bound| customer.last_logged_in_at < bound)
            && self.last_logged_in_after.map_or(true, |bound| customer.last_logged_in_at > bound)
    }
}
