//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The `audit_log` table is append-only at the permission level; this
//! repository never updates or deletes rows.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::TenetResult;
use tenet_core::identity::IdentityKey;
use tenet_core::models::audit::{
    ActorType, AuditLogEntry, AuditLogFilter, AuditOutcome, CreateAuditLogEntry,
};
use tenet_core::repository::{AuditLogRepository, PaginatedResult, Pagination};

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    actor_id: Option<String>,
    actor_type: String,
    action: String,
    resource_id: Option<String>,
    tenant_id: Option<String>,
    outcome: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    actor_id: Option<String>,
    actor_type: String,
    action: String,
    resource_id: Option<String>,
    tenant_id: Option<String>,
    outcome: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_actor_type(s: &str) -> Result<ActorType, DbError> {
    match s {
        "User" => Ok(ActorType::User),
        "System" => Ok(ActorType::System),
        other => Err(DbError::Decode(format!("unknown actor type: {other}"))),
    }
}

fn actor_type_str(actor_type: ActorType) -> &'static str {
    match actor_type {
        ActorType::User => "User",
        ActorType::System => "System",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, DbError> {
    match s {
        "Success" => Ok(AuditOutcome::Success),
        "Failure" => Ok(AuditOutcome::Failure),
        "Denied" => Ok(AuditOutcome::Denied),
        other => Err(DbError::Decode(format!("unknown audit outcome: {other}"))),
    }
}

fn outcome_str(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "Success",
        AuditOutcome::Failure => "Failure",
        AuditOutcome::Denied => "Denied",
    }
}

fn parse_key(raw: &str, what: &str) -> Result<IdentityKey, DbError> {
    IdentityKey::from_storage_key(raw)
        .map_err(|e| DbError::Decode(format!("invalid {what} key: {e}")))
}

fn parse_optional_key(raw: Option<String>, what: &str) -> Result<Option<IdentityKey>, DbError> {
    raw.as_deref().map(|raw| parse_key(raw, what)).transpose()
}

fn row_to_entry(row: AuditRow, id: IdentityKey) -> Result<AuditLogEntry, DbError> {
    Ok(AuditLogEntry {
        id,
        actor_id: parse_optional_key(row.actor_id, "actor")?,
        actor_type: parse_actor_type(&row.actor_type)?,
        action: row.action,
        resource_id: parse_optional_key(row.resource_id, "resource")?,
        tenant_id: parse_optional_key(row.tenant_id, "tenant")?,
        outcome: parse_outcome(&row.outcome)?,
        metadata: row.metadata,
        timestamp: row.timestamp,
    })
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = parse_key(&self.record_id, "audit entry")?;
        row_to_entry(
            AuditRow {
                actor_id: self.actor_id,
                actor_type: self.actor_type,
                action: self.action,
                resource_id: self.resource_id,
                tenant_id: self.tenant_id,
                outcome: self.outcome,
                metadata: self.metadata,
                timestamp: self.timestamp,
            },
            id,
        )
    }
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, entry: CreateAuditLogEntry) -> TenetResult<AuditLogEntry> {
        let id = IdentityKey::generate();
        let id_str = id.storage_key();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, \
                 actor_type = $actor_type, \
                 action = $action, \
                 resource_id = $resource_id, \
                 tenant_id = $tenant_id, \
                 outcome = $outcome, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor_id", entry.actor_id.map(|k| k.storage_key())))
            .bind(("actor_type", actor_type_str(entry.actor_type).to_string()))
            .bind(("action", entry.action))
            .bind(("resource_id", entry.resource_id.map(|k| k.storage_key())))
            .bind(("tenant_id", entry.tenant_id.map(|k| k.storage_key())))
            .bind(("outcome", outcome_str(entry.outcome).to_string()))
            .bind(("metadata", entry.metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row_to_entry(row, id)?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> TenetResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions: Vec<&str> = Vec::new();
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.actor_id.is_some() {
            conditions.push("actor_id = $actor_id");
        }
        if filter.resource_id.is_some() {
            conditions.push("resource_id = $resource_id");
        }
        if filter.tenant_id.is_some() {
            conditions.push("tenant_id = $tenant_id");
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT count() AS total FROM audit_log{where_clause} GROUP ALL");
        let mut builder = self.db.query(&count_query);
        if let Some(ref action) = filter.action {
            builder = builder.bind(("action", action.clone()));
        }
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.storage_key()));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.storage_key()));
        }
        if let Some(tenant_id) = filter.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.storage_key()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }
        let mut count_result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        // Newest entries first.
        let page_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log{where_clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset"
        );
        let mut builder = self
            .db
            .query(&page_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.storage_key()));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.storage_key()));
        }
        if let Some(tenant_id) = filter.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.storage_key()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
