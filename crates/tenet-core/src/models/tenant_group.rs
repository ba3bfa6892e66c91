//! Tenant group domain model.
//!
//! A group belongs to exactly one tenant; user membership in a group is the
//! scoped many-to-many relation managed by the group-member repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantGroup {
    pub id: IdentityKey,
    pub tenant_id: IdentityKey,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenantGroup {
    pub tenant_id: IdentityKey,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenantGroup {
    pub name: Option<String>,
}
