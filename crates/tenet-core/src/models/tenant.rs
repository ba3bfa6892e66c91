//! Tenant domain model.
//!
//! Tenants are the top-level scoping resource. Group membership and scoped
//! permission grants are always qualified by a tenant id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: IdentityKey,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
}
