//! Identity keys: the external/internal identifier codec.
//!
//! Every resource is addressed by an identity key. The external form is a
//! UUID string; the internal form is the 16-byte binary value. Equality,
//! ordering and hashing are decided on the binary form, so two keys compare
//! equal regardless of how their string forms were cased.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TenetError, TenetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(Uuid);

impl IdentityKey {
    /// A fresh random key (v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an external identifier. Uppercase hex is accepted and
    /// normalized; anything that is not UUID-shaped is rejected.
    pub fn encode(external: &str) -> TenetResult<Self> {
        Uuid::parse_str(external).map(Self).map_err(|_| {
            TenetError::BadRequest {
                message: format!("invalid identity key: {external}"),
            }
        })
    }

    /// Canonical external form: lowercase, hyphenated.
    pub fn decode(&self) -> String {
        self.0.as_hyphenated().to_string()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Record-id form used by the storage layer: 32 hex chars, no hyphens.
    pub fn storage_key(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// Parse a stored record id. Accepts both the simple and the hyphenated
    /// form so hand-written fixtures keep working.
    pub fn from_storage_key(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

impl FromStr for IdentityKey {
    type Err = TenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::encode(s)
    }
}

impl From<Uuid> for IdentityKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
