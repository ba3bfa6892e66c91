//! User domain model.
//!
//! Users are created and updated through schema-validated attribute maps
//! rather than typed input structs; see [`crate::schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: IdentityKey,
    pub email: String,
    /// Argon2id hash; never serialized outward.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Per-user salt, fixed at creation; never serialized outward.
    #[serde(skip_serializing, default)]
    pub salt: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub meta: Map<String, Value>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Externally visible attributes as a JSON object. Secret fields are
    /// excluded by the serializer, so this is safe for event payloads.
    pub fn public_attributes(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User {
            id: IdentityKey::generate(),
            email: "a@b.com".into(),
            password_hash: "$argon2id$...".into(),
            salt: "somesalt".into(),
            firstname: Some("Ada".into()),
            lastname: None,
            meta: Map::new(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn serialization_excludes_secrets() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("password_hash"));
        assert!(!object.contains_key("salt"));
        assert!(object.contains_key("email"));
    }

    #[test]
    fn public_attributes_carry_the_id() {
        let user = sample();
        let attrs = user.public_attributes();
        assert_eq!(
            attrs.get("id").and_then(Value::as_str),
            Some(user.id.decode().as_str())
        );
    }
}
