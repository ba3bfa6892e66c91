//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: IdentityKey,
    pub actor_id: Option<IdentityKey>,
    pub actor_type: ActorType,
    /// Dotted action name, e.g. `users.create`.
    pub action: String,
    pub resource_id: Option<IdentityKey>,
    pub tenant_id: Option<IdentityKey>,
    pub outcome: AuditOutcome,
    /// Redacted attribute payload; empty object when payload logging is off.
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor_id: Option<IdentityKey>,
    pub actor_type: ActorType,
    pub action: String,
    pub resource_id: Option<IdentityKey>,
    pub tenant_id: Option<IdentityKey>,
    pub outcome: AuditOutcome,
    pub metadata: Value,
}

/// Filter for audit queries; all fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub action: Option<String>,
    pub actor_id: Option<IdentityKey>,
    pub resource_id: Option<IdentityKey>,
    pub tenant_id: Option<IdentityKey>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
