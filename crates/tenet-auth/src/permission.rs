//! Permission evaluation against stored grants.

use tenet_core::error::TenetResult;
use tenet_core::identity::IdentityKey;
use tenet_core::models::permission::PermissionSet;
use tenet_core::repository::PermissionGrantRepository;

/// Answers "may this user do that" questions from the grant store.
///
/// Evaluation is read-only. Each call loads the user's grants once and
/// resolves the whole question against the resulting [`PermissionSet`],
/// so a handler checking several actions pays a single fetch via
/// [`PermissionEvaluator::load`].
#[derive(Debug, Clone)]
pub struct PermissionEvaluator<P: PermissionGrantRepository> {
    grants: P,
}

impl<P: PermissionGrantRepository> PermissionEvaluator<P> {
    pub fn new(grants: P) -> Self {
        Self { grants }
    }

    /// Fetch and index every grant the user holds.
    pub async fn load(&self, user_id: IdentityKey) -> TenetResult<PermissionSet> {
        let grants = self.grants.get_user_grants(user_id).await?;
        Ok(PermissionSet::from_grants(&grants))
    }

    /// True when the user holds every listed action, each either globally
    /// or under `tenant_id`. An empty list is vacuously true.
    pub async fn has_all<S: AsRef<str> + Sync>(
        &self,
        user_id: IdentityKey,
        actions: &[S],
        tenant_id: Option<IdentityKey>,
    ) -> TenetResult<bool> {
        Ok(self.load(user_id).await?.has_all(actions, tenant_id))
    }

    /// True when the user holds at least one listed action. An empty list
    /// is false.
    pub async fn has_any<S: AsRef<str> + Sync>(
        &self,
        user_id: IdentityKey,
        actions: &[S],
        tenant_id: Option<IdentityKey>,
    ) -> TenetResult<bool> {
        Ok(self.load(user_id).await?.has_any(actions, tenant_id))
    }
}
