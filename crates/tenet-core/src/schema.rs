//! Declarative resource schemas.
//!
//! Each resource type declares its attribute surface once: which attributes
//! exist, which are required, which hold secrets, and which columns external
//! callers may sort on. Whitelisting, type checks and secret redaction all
//! derive from this single declaration instead of per-call-site lists.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TenetError, TenetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Bool,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Secret fields are dropped from event payloads and replaced with a
    /// sentinel in audit payloads.
    pub secret: bool,
    /// Storage column the attribute is written to.
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    pub resource: &'static str,
    fields: &'static [FieldRule],
    /// External sort names mapped to storage expressions. `id` is always
    /// present; secret columns never are.
    sortable: &'static [(&'static str, &'static str)],
}

const USER_FIELDS: &[FieldRule] = &[
    FieldRule {
        name: "email",
        kind: FieldKind::Email,
        required: true,
        secret: false,
        column: "email",
    },
    FieldRule {
        name: "password",
        kind: FieldKind::Password,
        required: true,
        secret: true,
        column: "password_hash",
    },
    FieldRule {
        name: "firstname",
        kind: FieldKind::Text,
        required: false,
        secret: false,
        column: "firstname",
    },
    FieldRule {
        name: "lastname",
        kind: FieldKind::Text,
        required: false,
        secret: false,
        column: "lastname",
    },
    FieldRule {
        name: "meta",
        kind: FieldKind::Json,
        required: false,
        secret: false,
        column: "meta",
    },
    FieldRule {
        name: "enabled",
        kind: FieldKind::Bool,
        required: false,
        secret: false,
        column: "enabled",
    },
];

const USER_SORTABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("email", "email"),
    ("firstname", "firstname"),
    ("lastname", "lastname"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

/// The schema for the `user` resource.
pub fn users() -> ResourceSchema {
    ResourceSchema {
        resource: "user",
        fields: USER_FIELDS,
        sortable: USER_SORTABLE,
    }
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.name == name)
    }

    /// Validate a full attribute set for creation: required attributes must
    /// be present, nothing outside the allowed set, every value well-typed.
    pub fn validate_create(&self, attrs: &Map<String, Value>) -> TenetResult<()> {
        for rule in self.fields.iter().filter(|rule| rule.required) {
            if !attrs.contains_key(rule.name) {
                return Err(TenetError::BadRequest {
                    message: format!("missing required attribute: {}", rule.name),
                });
            }
        }
        self.validate_present(attrs)
    }

    /// Validate a partial attribute set for update: required attributes may
    /// be absent, but present ones follow the same rules as creation.
    pub fn validate_update(&self, attrs: &Map<String, Value>) -> TenetResult<()> {
        self.validate_present(attrs)
    }

    fn validate_present(&self, attrs: &Map<String, Value>) -> TenetResult<()> {
        for (name, value) in attrs {
            let rule = self.field(name).ok_or_else(|| TenetError::BadRequest {
                message: format!("attribute not allowed for {}: {name}", self.resource),
            })?;
            check_kind(rule, value)?;
        }
        Ok(())
    }

    /// Drop secret fields entirely; used for event payloads.
    pub fn sanitize(&self, attrs: &Map<String, Value>) -> Map<String, Value> {
        attrs
            .iter()
            .filter(|(name, _)| !self.field(name).is_some_and(|rule| rule.secret))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Replace secret values with a sentinel; used for audit payloads.
    pub fn redact(&self, attrs: &Map<String, Value>) -> Map<String, Value> {
        attrs
            .iter()
            .map(|(name, value)| {
                let value = if self.field(name).is_some_and(|rule| rule.secret) {
                    Value::String(REDACTED.into())
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Storage expression for an externally supplied sort field.
    pub fn sort_column(&self, external: &str) -> Option<&'static str> {
        self.sortable
            .iter()
            .find(|(name, _)| *name == external)
            .map(|(_, column)| *column)
    }
}

pub const REDACTED: &str = "<redacted>";

fn check_kind(rule: &FieldRule, value: &Value) -> TenetResult<()> {
    let ok = match rule.kind {
        FieldKind::Text | FieldKind::Password => value.is_string(),
        FieldKind::Email => value.as_str().is_some_and(valid_email),
        FieldKind::Bool => canonical_bool(value).is_some(),
        FieldKind::Json => value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(TenetError::BadRequest {
            message: format!("invalid value for attribute: {}", rule.name),
        })
    }
}

/// Canonical boolean coercion: JSON booleans pass through, the integers
/// 0 and 1 map to false and true, everything else is rejected.
pub fn canonical_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Minimal email shape check: one `@`, non-empty local part, domain with a
/// dot, no whitespace. Deliverability is not this layer's problem.
pub fn valid_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.len() >= 3
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Schema for the free-form `meta` attribute, configured per deployment.
/// Declared fields are checked for presence and kind; undeclared keys are
/// passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSchema {
    pub fields: Vec<MetaField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaField {
    pub name: String,
    pub kind: MetaFieldKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaFieldKind {
    Text,
    Number,
    Boolean,
    Object,
    Array,
}

impl MetaSchema {
    pub fn validate(&self, meta: &Map<String, Value>) -> TenetResult<()> {
        for field in &self.fields {
            match meta.get(&field.name) {
                None if field.required => {
                    return Err(TenetError::BadRequest {
                        message: format!("missing required meta field: {}", field.name),
                    });
                }
                None => {}
                Some(value) => {
                    let ok = match field.kind {
                        MetaFieldKind::Text => value.is_string(),
                        MetaFieldKind::Number => value.is_number(),
                        MetaFieldKind::Boolean => value.is_boolean(),
                        MetaFieldKind::Object => value.is_object(),
                        MetaFieldKind::Array => value.is_array(),
                    };
                    if !ok {
                        return Err(TenetError::BadRequest {
                            message: format!("invalid value for meta field: {}", field.name),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
