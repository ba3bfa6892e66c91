//! SurrealDB implementation of [`TenantRepository`].
//!
//! Tenant membership lives in the `tenant_user` table with a composite
//! record id, so attach and detach are idempotent single-record writes.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::{TenetError, TenetResult};
use tenet_core::identity::IdentityKey;
use tenet_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use tenet_core::repository::{PaginatedResult, Pagination, TenantRepository};

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_tenant(row: TenantRow, id: IdentityKey) -> Tenant {
    Tenant {
        id,
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        let id = IdentityKey::from_storage_key(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid tenant key: {e}")))?;
        Ok(Tenant {
            id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UserIdRow {
    user_id: String,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn membership_key(tenant_id: IdentityKey, user_id: IdentityKey) -> String {
    format!("{}:{}", tenant_id.storage_key(), user_id.storage_key())
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
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

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> TenetResult<Tenant> {
        let id = IdentityKey::generate();
        let id_str = id.storage_key();

        let result = self
            .db
            .query("CREATE type::record('tenant', $id) SET name = $name")
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row_to_tenant(row, id))
    }

    async fn get(&self, id: IdentityKey) -> TenetResult<Tenant> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| TenetError::NotFound {
            entity: "tenant".into(),
            id: id.decode(),
        })?;

        Ok(row_to_tenant(row, id))
    }

    async fn update(&self, id: IdentityKey, input: UpdateTenant) -> TenetResult<Tenant> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('tenant', $id) SET {}", sets.join(", "));
        let mut builder = self.db.query(&query).bind(("id", id.storage_key()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| TenetError::NotFound {
            entity: "tenant".into(),
            id: id.decode(),
        })?;

        Ok(row_to_tenant(row, id))
    }

    async fn delete(&self, id: IdentityKey) -> TenetResult<()> {
        if !self.record_exists("tenant", &id.storage_key()).await? {
            return Err(TenetError::NotFound {
                entity: "tenant".into(),
                id: id.decode(),
            });
        }

        // Membership, groups and scoped grants go with the tenant.
        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::record('tenant', $id); \
                 DELETE tenant_user WHERE tenant_id = $id; \
                 DELETE group_member WHERE tenant_id = $id; \
                 DELETE tenant_group WHERE tenant_id = $id; \
                 DELETE permission_grant WHERE tenant_id = $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> TenetResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_tenant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_user(&self, tenant_id: IdentityKey, user_id: IdentityKey) -> TenetResult<()> {
        if !self.record_exists("tenant", &tenant_id.storage_key()).await? {
            return Err(TenetError::NotFound {
                entity: "tenant".into(),
                id: tenant_id.decode(),
            });
        }
        if !self.record_exists("user", &user_id.storage_key()).await? {
            return Err(TenetError::NotFound {
                entity: "user".into(),
                id: user_id.decode(),
            });
        }

        let result = self
            .db
            .query(
                "UPSERT type::record('tenant_user', $key) SET \
                 tenant_id = $tenant_id, user_id = $user_id",
            )
            .bind(("key", membership_key(tenant_id, user_id)))
            .bind(("tenant_id", tenant_id.storage_key()))
            .bind(("user_id", user_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        Ok(())
    }

    async fn remove_user(&self, tenant_id: IdentityKey, user_id: IdentityKey) -> TenetResult<()> {
        self.db
            .query("DELETE type::record('tenant_user', $key)")
            .bind(("key", membership_key(tenant_id, user_id)))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn has_user(&self, tenant_id: IdentityKey, user_id: IdentityKey) -> TenetResult<bool> {
        self.record_exists("tenant_user", &membership_key(tenant_id, user_id))
            .await
    }

    async fn user_ids(&self, tenant_id: IdentityKey) -> TenetResult<Vec<IdentityKey>> {
        let mut result = self
            .db
            .query("SELECT user_id FROM tenant_user WHERE tenant_id = $tenant_id")
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserIdRow> = result.take(0).map_err(DbError::from)?;
        let ids = rows
            .into_iter()
            .map(|row| {
                IdentityKey::from_storage_key(&row.user_id)
                    .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(ids)
    }
}
