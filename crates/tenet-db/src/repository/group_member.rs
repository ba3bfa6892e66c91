//! SurrealDB implementation of [`GroupMemberRepository`].
//!
//! Membership rows use a composite record id (`tenant:group:user`), so a
//! batch add is a sequence of idempotent UPSERTs inside one transaction:
//! either every requested membership lands or none of them do.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::config::ModelConfig;
use tenet_core::error::{TenetError, TenetResult};
use tenet_core::events::{DomainEvent, EventEmitter};
use tenet_core::identity::IdentityKey;
use tenet_core::models::audit::{ActorType, AuditOutcome, CreateAuditLogEntry};
use tenet_core::models::user::User;
use tenet_core::repository::{AuditLogRepository, CollectionQuery, GroupMemberRepository, PaginatedResult};
use tenet_core::schema;
use tracing::debug;

use crate::error::DbError;
use crate::repository::audit::SurrealAuditLogRepository;

#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    email: String,
    password_hash: String,
    salt: String,
    firstname: Option<String>,
    lastname: Option<String>,
    meta: serde_json::Value,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = IdentityKey::from_storage_key(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))?;
        let Value::Object(meta) = self.meta else {
            return Err(DbError::Decode("user meta is not an object".into()));
        };
        Ok(User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            salt: self.salt,
            firstname: self.firstname,
            lastname: self.lastname,
            meta,
            enabled: self.enabled,
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

fn member_key(tenant: &str, group: &str, user: &str) -> String {
    format!("{tenant}:{group}:{user}")
}

fn member_payload(
    tenant_id: IdentityKey,
    group_id: IdentityKey,
    user_ids: &[String],
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("tenant_id".into(), Value::String(tenant_id.decode()));
    payload.insert("group_id".into(), Value::String(group_id.decode()));
    payload.insert(
        "user_ids".into(),
        Value::Array(user_ids.iter().cloned().map(Value::String).collect()),
    );
    payload
}

/// SurrealDB implementation of the group membership repository.
#[derive(Clone)]
pub struct SurrealGroupMemberRepository<C: Connection> {
    db: Surreal<C>,
    config: ModelConfig,
    emitter: Arc<dyn EventEmitter>,
    audit: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealGroupMemberRepository<C> {
    pub fn new(db: Surreal<C>, config: ModelConfig, emitter: Arc<dyn EventEmitter>) -> Self {
        let audit = SurrealAuditLogRepository::new(db.clone());
        Self {
            db,
            config,
            emitter,
            audit,
        }
    }

    async fn group_in_tenant(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
    ) -> TenetResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM type::record('tenant_group', $id) \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("id", group_id.storage_key()))
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    /// The user ids attached to the tenant, as storage keys.
    async fn tenant_user_keys(&self, tenant_id: IdentityKey) -> TenetResult<HashSet<String>> {
        let mut result = self
            .db
            .query("SELECT user_id FROM tenant_user WHERE tenant_id = $tenant_id")
            .bind(("tenant_id", tenant_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserIdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    async fn record_audit(
        &self,
        action: &str,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        payload: Map<String, Value>,
    ) -> TenetResult<()> {
        if !self.config.audits(action) {
            return Ok(());
        }
        let metadata = if self.config.audit_include_payload {
            Value::Object(payload)
        } else {
            Value::Object(Map::new())
        };
        self.audit
            .append(CreateAuditLogEntry {
                actor_id: None,
                actor_type: ActorType::System,
                action: action.to_string(),
                resource_id: Some(group_id),
                tenant_id: Some(tenant_id),
                outcome: AuditOutcome::Success,
                metadata,
            })
            .await?;
        Ok(())
    }
}

impl<C: Connection> GroupMemberRepository for SurrealGroupMemberRepository<C> {
    async fn has(&self, tenant_id: &str, group_id: &str, user_id: &str) -> TenetResult<bool> {
        let (Ok(tenant), Ok(group), Ok(user)) = (
            IdentityKey::encode(tenant_id),
            IdentityKey::encode(group_id),
            IdentityKey::encode(user_id),
        ) else {
            return Ok(false);
        };

        let key = member_key(
            &tenant.storage_key(),
            &group.storage_key(),
            &user.storage_key(),
        );
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record('group_member', $key) GROUP ALL")
            .bind(("key", key))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn add(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        user_ids: &[String],
    ) -> TenetResult<()> {
        if !self.group_in_tenant(tenant_id, group_id).await? {
            return Err(TenetError::NotFound {
                entity: "tenant_group".into(),
                id: group_id.decode(),
            });
        }

        // Strict batch: every id must parse and belong to the tenant
        // before anything is written.
        let universe = self.tenant_user_keys(tenant_id).await?;
        let mut members = Vec::with_capacity(user_ids.len());
        for raw in user_ids {
            let user = IdentityKey::encode(raw).map_err(|_| TenetError::BadRequest {
                message: format!("invalid user id: {raw}"),
            })?;
            if !universe.contains(&user.storage_key()) {
                return Err(TenetError::BadRequest {
                    message: format!("user does not belong to the tenant: {raw}"),
                });
            }
            members.push(user);
        }

        if !members.is_empty() {
            let tenant_key = tenant_id.storage_key();
            let group_key = group_id.storage_key();

            let mut statements = vec!["BEGIN TRANSACTION".to_string()];
            for i in 0..members.len() {
                statements.push(format!(
                    "UPSERT type::record('group_member', $key_{i}) SET \
                     tenant_id = $tenant_id, group_id = $group_id, user_id = $user_{i}"
                ));
            }
            statements.push("COMMIT TRANSACTION".to_string());
            let query = statements.join("; ");

            let mut builder = self
                .db
                .query(&query)
                .bind(("tenant_id", tenant_key.clone()))
                .bind(("group_id", group_key.clone()));
            for (i, member) in members.iter().enumerate() {
                let user_key = member.storage_key();
                builder = builder
                    .bind((
                        format!("key_{i}"),
                        member_key(&tenant_key, &group_key, &user_key),
                    ))
                    .bind((format!("user_{i}"), user_key));
            }
            let result = builder.await.map_err(DbError::from)?;
            result.check().map_err(DbError::from)?;
        }

        let ids: Vec<String> = members.iter().map(|m| m.decode()).collect();
        self.record_audit(
            "tenant_group.members_add",
            tenant_id,
            group_id,
            member_payload(tenant_id, group_id, &ids),
        )
        .await?;
        self.emitter.emit(DomainEvent::new(
            "tenant_group.members_added",
            json!({
                "tenant_id": tenant_id.decode(),
                "group_id": group_id.decode(),
                "user_ids": ids,
            }),
        ));

        Ok(())
    }

    async fn remove(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        user_ids: &[String],
    ) -> TenetResult<()> {
        if !self.group_in_tenant(tenant_id, group_id).await? {
            return Err(TenetError::NotFound {
                entity: "tenant_group".into(),
                id: group_id.decode(),
            });
        }

        // Tolerant cleanup: malformed ids are skipped, absent rows are
        // no-ops.
        let mut members = Vec::with_capacity(user_ids.len());
        for raw in user_ids {
            match IdentityKey::encode(raw) {
                Ok(user) => members.push(user),
                Err(_) => debug!(user_id = %raw, "skipping malformed user id in removal"),
            }
        }

        if !members.is_empty() {
            let keys: Vec<String> = members.iter().map(|m| m.storage_key()).collect();
            self.db
                .query(
                    "DELETE group_member WHERE tenant_id = $tenant_id \
                     AND group_id = $group_id AND user_id IN $user_ids",
                )
                .bind(("tenant_id", tenant_id.storage_key()))
                .bind(("group_id", group_id.storage_key()))
                .bind(("user_ids", keys))
                .await
                .map_err(DbError::from)?;
        }

        let ids: Vec<String> = members.iter().map(|m| m.decode()).collect();
        self.record_audit(
            "tenant_group.members_remove",
            tenant_id,
            group_id,
            member_payload(tenant_id, group_id, &ids),
        )
        .await?;
        self.emitter.emit(DomainEvent::new(
            "tenant_group.members_removed",
            json!({
                "tenant_id": tenant_id.decode(),
                "group_id": group_id.decode(),
                "user_ids": ids,
            }),
        ));

        Ok(())
    }

    async fn get_collection(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        query: CollectionQuery,
    ) -> TenetResult<PaginatedResult<User>> {
        if !self.group_in_tenant(tenant_id, group_id).await? {
            return Err(TenetError::NotFound {
                entity: "tenant_group".into(),
                id: group_id.decode(),
            });
        }

        let sort = query.sort.unwrap_or_default();
        let column = schema::users()
            .sort_column(&sort.field)
            .ok_or_else(|| TenetError::BadRequest {
                message: format!("cannot sort by: {}", sort.field),
            })?;
        let direction = if sort.descending { "DESC" } else { "ASC" };
        let pagination = query.pagination;

        const MEMBER_FILTER: &str = "meta::id(id) IN \
            (SELECT VALUE user_id FROM group_member \
             WHERE tenant_id = $tenant_id AND group_id = $group_id)";

        let count_query =
            format!("SELECT count() AS total FROM user WHERE {MEMBER_FILTER} GROUP ALL");
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("tenant_id", tenant_id.storage_key()))
            .bind(("group_id", group_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        // The sort column comes from the schema whitelist, never from the
        // caller's string.
        let page_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user WHERE {MEMBER_FILTER} \
             ORDER BY {column} {direction} LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&page_query)
            .bind(("tenant_id", tenant_id.storage_key()))
            .bind(("group_id", group_id.storage_key()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        // The read announcement carries the resulting ids, never attributes.
        let ids: Vec<String> = items.iter().map(|user| user.id.decode()).collect();
        debug!(
            tenant_id = %tenant_id.decode(),
            group_id = %group_id.decode(),
            count = ids.len(),
            "group members read"
        );
        self.record_audit(
            "tenant_group.members_read",
            tenant_id,
            group_id,
            member_payload(tenant_id, group_id, &ids),
        )
        .await?;
        self.emitter.emit(DomainEvent::new(
            "tenant_group.members_read",
            json!({
                "tenant_id": tenant_id.decode(),
                "group_id": group_id.decode(),
                "user_ids": ids,
            }),
        ));

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
