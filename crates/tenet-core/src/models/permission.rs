//! Permission domain model.
//!
//! A permission is a capability string granted to a user either globally or
//! scoped to one tenant. The effective set a check runs against is the union
//! of global grants and the grants scoped to the tenant in question.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: IdentityKey,
    pub action: String,
    /// `None` means the grant is global.
    pub tenant_id: Option<IdentityKey>,
    pub created_at: DateTime<Utc>,
}

/// A user's resolved grants, ready for pure membership queries.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    global: HashSet<String>,
    scoped: HashMap<IdentityKey, HashSet<String>>,
}

impl PermissionSet {
    pub fn from_grants(grants: &[PermissionGrant]) -> Self {
        let mut set = Self::default();
        for grant in grants {
            set.insert(&grant.action, grant.tenant_id);
        }
        set
    }

    pub fn insert(&mut self, action: &str, tenant_id: Option<IdentityKey>) {
        match tenant_id {
            None => {
                self.global.insert(action.to_string());
            }
            Some(tenant) => {
                self.scoped
                    .entry(tenant)
                    .or_default()
                    .insert(action.to_string());
            }
        }
    }

    /// Whether `action` is granted globally or under the given tenant.
    pub fn contains(&self, action: &str, tenant_id: Option<IdentityKey>) -> bool {
        if self.global.contains(action) {
            return true;
        }
        tenant_id
            .and_then(|tenant| self.scoped.get(&tenant))
            .is_some_and(|grants| grants.contains(action))
    }

    /// True iff every listed action is granted. Vacuously true for an empty
    /// list.
    pub fn has_all<S: AsRef<str>>(&self, actions: &[S], tenant_id: Option<IdentityKey>) -> bool {
        actions
            .iter()
            .all(|action| self.contains(action.as_ref(), tenant_id))
    }

    /// True iff at least one listed action is granted. False for an empty
    /// list.
    pub fn has_any<S: AsRef<str>>(&self, actions: &[S], tenant_id: Option<IdentityKey>) -> bool {
        actions
            .iter()
            .any(|action| self.contains(action.as_ref(), tenant_id))
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.scoped.values().all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants() -> (PermissionSet, IdentityKey, IdentityKey) {
        let tenant_a = IdentityKey::generate();
        let tenant_b = IdentityKey::generate();
        let mut set = PermissionSet::default();
        set.insert("users.read", None);
        set.insert("users.write", Some(tenant_a));
        (set, tenant_a, tenant_b)
    }

    #[test]
    fn global_grants_apply_everywhere() {
        let (set, tenant_a, tenant_b) = grants();
        assert!(set.contains("users.read", None));
        assert!(set.contains("users.read", Some(tenant_a)));
        assert!(set.contains("users.read", Some(tenant_b)));
    }

    #[test]
    fn scoped_grants_stay_in_their_tenant() {
        let (set, tenant_a, tenant_b) = grants();
        assert!(set.contains("users.write", Some(tenant_a)));
        assert!(!set.contains("users.write", Some(tenant_b)));
        assert!(!set.contains("users.write", None));
    }

    #[test]
    fn has_all_is_union_of_global_and_scoped() {
        let (set, tenant_a, _) = grants();
        assert!(set.has_all(&["users.read", "users.write"], Some(tenant_a)));
        assert!(!set.has_all(&["users.read", "users.write"], None));
        assert!(!set.has_all(&["users.read", "users.admin"], Some(tenant_a)));
    }

    #[test]
    fn has_any_matches_a_single_grant() {
        let (set, _, tenant_b) = grants();
        assert!(set.has_any(&["users.admin", "users.read"], Some(tenant_b)));
        assert!(!set.has_any(&["users.admin", "users.write"], Some(tenant_b)));
    }

    #[test]
    fn empty_query_edge_cases() {
        let (set, tenant_a, _) = grants();
        let none: &[&str] = &[];
        assert!(set.has_all(none, Some(tenant_a)));
        assert!(!set.has_any(none, Some(tenant_a)));

        let empty = PermissionSet::default();
        assert!(empty.has_all(none, None));
        assert!(!empty.has_any(none, None));
        assert!(empty.is_empty());
    }
}
