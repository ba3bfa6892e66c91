//! SurrealDB implementation of [`TenantGroupRepository`].
//!
//! Every read and write is qualified by the owning tenant, so a group id
//! from one tenant can never resolve under another.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::{TenetError, TenetResult};
use tenet_core::identity::IdentityKey;
use tenet_core::models::tenant_group::{CreateTenantGroup, TenantGroup, UpdateTenantGroup};
use tenet_core::repository::{PaginatedResult, Pagination, TenantGroupRepository};

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupRow {
    tenant_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_group(row: GroupRow, id: IdentityKey) -> Result<TenantGroup, DbError> {
    let tenant_id = IdentityKey::from_storage_key(&row.tenant_id)
        .map_err(|e| DbError::Decode(format!("invalid tenant key: {e}")))?;
    Ok(TenantGroup {
        id,
        tenant_id,
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<TenantGroup, DbError> {
        let id = IdentityKey::from_storage_key(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid group key: {e}")))?;
        row_to_group(
            GroupRow {
                tenant_id: self.tenant_id,
                name: self.name,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the tenant group repository.
#[derive(Clone)]
pub struct SurrealTenantGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn tenant_exists(&self, tenant_id: IdentityKey) -> TenetResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record('tenant', $id) GROUP ALL")
            .bind(("id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn name_in_use(
        &self,
        tenant_id: IdentityKey,
        name: &str,
        exclude: Option<IdentityKey>,
    ) -> TenetResult<bool> {
        let mut query = String::from(
            "SELECT count() AS total FROM tenant_group \
             WHERE tenant_id = $tenant_id AND name = $name",
        );
        if exclude.is_some() {
            query.push_str(" AND meta::id(id) != $exclude");
        }
        query.push_str(" GROUP ALL");

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.storage_key()))
            .bind(("name", name.to_string()));
        if let Some(exclude) = exclude {
            builder = builder.bind(("exclude", exclude.storage_key()));
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> TenantGroupRepository for SurrealTenantGroupRepository<C> {
    async fn create(&self, input: CreateTenantGroup) -> TenetResult<TenantGroup> {
        if !self.tenant_exists(input.tenant_id).await? {
            return Err(TenetError::NotFound {
                entity: "tenant".into(),
                id: input.tenant_id.decode(),
            });
        }
        if self.name_in_use(input.tenant_id, &input.name, None).await? {
            return Err(TenetError::Conflict {
                message: format!("group name already in use: {}", input.name),
            });
        }

        let id = IdentityKey::generate();
        let id_str = id.storage_key();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant_group', $id) SET \
                 tenant_id = $tenant_id, name = $name",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.storage_key()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant_group".into(),
            id: id_str,
        })?;

        Ok(row_to_group(row, id)?)
    }

    async fn get(&self, tenant_id: IdentityKey, id: IdentityKey) -> TenetResult<TenantGroup> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('tenant_group', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.storage_key()))
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| TenetError::NotFound {
            entity: "tenant_group".into(),
            id: id.decode(),
        })?;

        Ok(row_to_group(row, id)?)
    }

    async fn update(
        &self,
        tenant_id: IdentityKey,
        id: IdentityKey,
        input: UpdateTenantGroup,
    ) -> TenetResult<TenantGroup> {
        let mut sets = Vec::new();
        if let Some(ref name) = input.name {
            if self.name_in_use(tenant_id, name, Some(id)).await? {
                return Err(TenetError::Conflict {
                    message: format!("group name already in use: {name}"),
                });
            }
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant_group', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );
        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.storage_key()))
            .bind(("tenant_id", tenant_id.storage_key()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| TenetError::NotFound {
            entity: "tenant_group".into(),
            id: id.decode(),
        })?;

        Ok(row_to_group(row, id)?)
    }

    async fn delete(&self, tenant_id: IdentityKey, id: IdentityKey) -> TenetResult<()> {
        // Resolve through the tenant scope first so a foreign id 404s.
        self.get(tenant_id, id).await?;

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::record('tenant_group', $id); \
                 DELETE group_member WHERE tenant_id = $tenant_id AND group_id = $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.storage_key()))
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        Ok(())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: IdentityKey,
        pagination: Pagination,
    ) -> TenetResult<PaginatedResult<TenantGroup>> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant_group \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant_group \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id.storage_key()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
