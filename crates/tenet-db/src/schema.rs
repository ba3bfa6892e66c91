//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Identity keys are stored as 32-char simple hex strings. Enums are
//! stored as strings with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users (global scope; email is unique across the whole system)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD salt ON TABLE user TYPE string;
DEFINE FIELD firstname ON TABLE user TYPE option<string>;
DEFINE FIELD lastname ON TABLE user TYPE option<string>;
DEFINE FIELD meta ON TABLE user TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD enabled ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Tenants
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Tenant membership (user belongs to tenant)
-- =======================================================================
DEFINE TABLE tenant_user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_user TYPE string;
DEFINE FIELD user_id ON TABLE tenant_user TYPE string;
DEFINE FIELD created_at ON TABLE tenant_user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_user ON TABLE tenant_user \
    COLUMNS tenant_id, user_id UNIQUE;

-- =======================================================================
-- Tenant groups
-- =======================================================================
DEFINE TABLE tenant_group SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_group TYPE string;
DEFINE FIELD name ON TABLE tenant_group TYPE string;
DEFINE FIELD created_at ON TABLE tenant_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_group_name ON TABLE tenant_group \
    COLUMNS tenant_id, name UNIQUE;

-- =======================================================================
-- Group membership (scoped by tenant and group)
-- =======================================================================
DEFINE TABLE group_member SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE group_member TYPE string;
DEFINE FIELD group_id ON TABLE group_member TYPE string;
DEFINE FIELD user_id ON TABLE group_member TYPE string;
DEFINE FIELD created_at ON TABLE group_member TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_member ON TABLE group_member \
    COLUMNS tenant_id, group_id, user_id UNIQUE;

-- =======================================================================
-- API keys
-- =======================================================================
DEFINE TABLE api_key SCHEMAFULL;
DEFINE FIELD user_id ON TABLE api_key TYPE string;
DEFINE FIELD name ON TABLE api_key TYPE string;
DEFINE FIELD key_id ON TABLE api_key TYPE string;
DEFINE FIELD secret_hash ON TABLE api_key TYPE string;
DEFINE FIELD referer ON TABLE api_key TYPE option<string>;
DEFINE FIELD ip_address ON TABLE api_key TYPE option<string>;
DEFINE FIELD rate_limit ON TABLE api_key TYPE option<int>;
DEFINE FIELD enabled ON TABLE api_key TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE api_key TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE api_key TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_api_key_key_id ON TABLE api_key \
    COLUMNS key_id UNIQUE;

-- =======================================================================
-- Permission grants (global when tenant_id is NONE)
-- =======================================================================
DEFINE TABLE permission_grant SCHEMAFULL;
DEFINE FIELD user_id ON TABLE permission_grant TYPE string;
DEFINE FIELD action ON TABLE permission_grant TYPE string;
DEFINE FIELD tenant_id ON TABLE permission_grant TYPE option<string>;
DEFINE FIELD created_at ON TABLE permission_grant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_permission_grant_user ON TABLE permission_grant \
    COLUMNS user_id;

-- =======================================================================
-- Pending email verifications (record id = user id, one per user)
-- =======================================================================
DEFINE TABLE email_verification SCHEMAFULL;
DEFINE FIELD user_id ON TABLE email_verification TYPE string;
DEFINE FIELD email ON TABLE email_verification TYPE string;
DEFINE FIELD key ON TABLE email_verification TYPE string;
DEFINE FIELD enable_on_success ON TABLE email_verification TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE email_verification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_email_verification_user ON TABLE email_verification \
    COLUMNS user_id UNIQUE;

-- =======================================================================
-- Rate counters (record id = opaque counter key)
-- =======================================================================
DEFINE TABLE rate_counter SCHEMAFULL;
DEFINE FIELD count ON TABLE rate_counter TYPE int;
DEFINE FIELD expires_at ON TABLE rate_counter TYPE datetime;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['User', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_action_time ON TABLE audit_log \
    COLUMNS action, timestamp;
DEFINE INDEX idx_audit_resource ON TABLE audit_log \
    COLUMNS resource_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
