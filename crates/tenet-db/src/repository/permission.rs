//! SurrealDB implementation of [`PermissionGrantRepository`].
//!
//! Grants use a deterministic record id (`user:action:scope`, where scope
//! is a tenant key or `global`), so granting is an idempotent UPSERT and
//! revoking is a plain record delete.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::TenetResult;
use tenet_core::identity::IdentityKey;
use tenet_core::models::permission::PermissionGrant;
use tenet_core::repository::PermissionGrantRepository;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GrantRow {
    user_id: String,
    action: String,
    tenant_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl GrantRow {
    fn try_into_grant(self) -> Result<PermissionGrant, DbError> {
        let user_id = IdentityKey::from_storage_key(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))?;
        let tenant_id = self
            .tenant_id
            .as_deref()
            .map(IdentityKey::from_storage_key)
            .transpose()
            .map_err(|e| DbError::Decode(format!("invalid tenant key: {e}")))?;
        Ok(PermissionGrant {
            user_id,
            action: self.action,
            tenant_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn grant_key(user_id: IdentityKey, action: &str, tenant_id: Option<IdentityKey>) -> String {
    let scope = match tenant_id {
        Some(tenant) => tenant.storage_key(),
        None => "global".to_string(),
    };
    format!("{}:{action}:{scope}", user_id.storage_key())
}

/// SurrealDB implementation of the permission grant repository.
#[derive(Clone)]
pub struct SurrealPermissionGrantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionGrantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn record_exists(&self, table: &str, id: &str) -> TenetResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record($table, $id) GROUP ALL")
            .bind(("table", table.to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> PermissionGrantRepository for SurrealPermissionGrantRepository<C> {
    async fn grant(
        &self,
        user_id: IdentityKey,
        action: &str,
        tenant_id: Option<IdentityKey>,
    ) -> TenetResult<()> {
        if !self.record_exists("user", &user_id.storage_key()).await? {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: user_id.decode(),
            }
            .into());
        }
        if let Some(tenant) = tenant_id {
            if !self.record_exists("tenant", &tenant.storage_key()).await? {
                return Err(DbError::NotFound {
                    entity: "tenant".into(),
                    id: tenant.decode(),
                }
                .into());
            }
        }

        let result = self
            .db
            .query(
                "UPSERT type::record('permission_grant', $key) SET \
                 user_id = $user_id, \
                 action = $action, \
                 tenant_id = $tenant_id",
            )
            .bind(("key", grant_key(user_id, action, tenant_id)))
            .bind(("user_id", user_id.storage_key()))
            .bind(("action", action.to_string()))
            .bind(("tenant_id", tenant_id.map(|t| t.storage_key())))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(DbError::from)?;
        Ok(())
    }

    async fn revoke(
        &self,
        user_id: IdentityKey,
        action: &str,
        tenant_id: Option<IdentityKey>,
    ) -> TenetResult<()> {
        // Revoking an absent grant is a no-op.
        self.db
            .query("DELETE type::record('permission_grant', $key)")
            .bind(("key", grant_key(user_id, action, tenant_id)))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_user_grants(&self, user_id: IdentityKey) -> TenetResult<Vec<PermissionGrant>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM permission_grant \
                 WHERE user_id = $user_id \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.storage_key()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_grant().map_err(Into::into))
            .collect()
    }
}
