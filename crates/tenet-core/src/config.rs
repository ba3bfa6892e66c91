//! Model-layer configuration.

use std::collections::HashSet;

use crate::schema::MetaSchema;

/// Behavioral switches for resource models, threaded in at construction.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Actions that produce audit-log entries. Actions outside this set are
    /// still performed and still emit domain events, but leave no audit row.
    pub audited_actions: HashSet<String>,
    /// Whether audit entries carry the (redacted) attribute payload or only
    /// the action and resource id.
    pub audit_include_payload: bool,
    /// When set, email changes go through the verification flow instead of
    /// being applied directly.
    pub email_verification: bool,
    /// Optional schema enforced on the user `meta` attribute.
    pub meta_schema: Option<MetaSchema>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            audited_actions: [
                "users.create",
                "users.update",
                "users.delete",
                "tenant_group.members_add",
                "tenant_group.members_remove",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            audit_include_payload: true,
            email_verification: false,
            meta_schema: None,
        }
    }
}

impl ModelConfig {
    pub fn audits(&self, action: &str) -> bool {
        self.audited_actions.contains(action)
    }
}
