//! API key domain model.
//!
//! Full keys have the shape `tenet_<key_id>_<secret>` and are shown exactly
//! once at creation; only the SHA-256 hash of the secret is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: IdentityKey,
    pub user_id: IdentityKey,
    pub name: String,
    /// Public lookup half of the key.
    pub key_id: String,
    #[serde(skip_serializing, default)]
    pub secret_hash: String,
    /// When set, requests must present exactly this referer (absent request
    /// referers normalize to the `UNKNOWN` sentinel before comparison).
    pub referer: Option<String>,
    /// When set, requests must originate from exactly this address.
    pub ip_address: Option<String>,
    /// Per-identity rate-limit ceiling override.
    pub rate_limit: Option<u32>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKey {
    pub user_id: IdentityKey,
    pub name: String,
    pub referer: Option<String>,
    pub ip_address: Option<String>,
    pub rate_limit: Option<u32>,
}
