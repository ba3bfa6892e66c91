//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. User mutations take schema-validated
//! attribute maps; membership batch mutations take raw id strings because
//! their malformed-input handling is part of the contract.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::TenetResult;
use crate::identity::IdentityKey;
use crate::models::{
    api_key::{ApiKey, CreateApiKey},
    audit::{AuditLogEntry, AuditLogFilter, CreateAuditLogEntry},
    permission::PermissionGrant,
    tenant::{CreateTenant, Tenant, UpdateTenant},
    tenant_group::{CreateTenantGroup, TenantGroup, UpdateTenantGroup},
    user::User,
    verification::EmailVerification,
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Sort order for collection queries. The field name is external and must
/// resolve through the resource schema's sortable columns.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: "id".into(),
            descending: false,
        }
    }
}

/// Arguments for collection reads: optional sort plus pagination.
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub sort: Option<SortSpec>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Create a user from a validated attribute map. With
    /// `include_verification` a pending email verification is stored that
    /// enables the account when redeemed.
    fn create(
        &self,
        attrs: Map<String, Value>,
        include_verification: bool,
    ) -> impl Future<Output = TenetResult<User>> + Send;

    /// Audited read; emits the read event.
    fn get(&self, id: IdentityKey) -> impl Future<Output = TenetResult<User>> + Send;

    /// Plain row fetch with no audit or event side effects, for internal
    /// resolution (credential validation, ancestor checks).
    fn find(&self, id: IdentityKey) -> impl Future<Output = TenetResult<Option<User>>> + Send;

    fn get_by_email(&self, email: &str) -> impl Future<Output = TenetResult<User>> + Send;

    /// Partial update. `check_email_verification = false` applies an email
    /// change directly even when verification is configured.
    fn update(
        &self,
        id: IdentityKey,
        attrs: Map<String, Value>,
        check_email_verification: bool,
    ) -> impl Future<Output = TenetResult<User>> + Send;

    fn delete(&self, id: IdentityKey) -> impl Future<Output = TenetResult<()>> + Send;

    /// Redeem a pending verification key. Returns false (never an error) for
    /// malformed ids, missing records and wrong keys.
    fn verify_email_key(
        &self,
        user_id: &str,
        key: &str,
    ) -> impl Future<Output = TenetResult<bool>> + Send;

    fn pending_verification(
        &self,
        user_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<Option<EmailVerification>>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TenetResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenants & groups
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = TenetResult<Tenant>> + Send;
    fn get(&self, id: IdentityKey) -> impl Future<Output = TenetResult<Tenant>> + Send;
    fn update(
        &self,
        id: IdentityKey,
        input: UpdateTenant,
    ) -> impl Future<Output = TenetResult<Tenant>> + Send;
    fn delete(&self, id: IdentityKey) -> impl Future<Output = TenetResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TenetResult<PaginatedResult<Tenant>>> + Send;

    /// Attach a user to the tenant; repeating is a no-op.
    fn add_user(
        &self,
        tenant_id: IdentityKey,
        user_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<()>> + Send;
    fn remove_user(
        &self,
        tenant_id: IdentityKey,
        user_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<()>> + Send;
    fn has_user(
        &self,
        tenant_id: IdentityKey,
        user_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<bool>> + Send;
    /// All user ids attached to the tenant; the candidate universe for
    /// group-membership mutation.
    fn user_ids(
        &self,
        tenant_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<Vec<IdentityKey>>> + Send;
}

pub trait TenantGroupRepository: Send + Sync {
    fn create(
        &self,
        input: CreateTenantGroup,
    ) -> impl Future<Output = TenetResult<TenantGroup>> + Send;
    fn get(
        &self,
        tenant_id: IdentityKey,
        id: IdentityKey,
    ) -> impl Future<Output = TenetResult<TenantGroup>> + Send;
    fn update(
        &self,
        tenant_id: IdentityKey,
        id: IdentityKey,
        input: UpdateTenantGroup,
    ) -> impl Future<Output = TenetResult<TenantGroup>> + Send;
    fn delete(
        &self,
        tenant_id: IdentityKey,
        id: IdentityKey,
    ) -> impl Future<Output = TenetResult<()>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: IdentityKey,
        pagination: Pagination,
    ) -> impl Future<Output = TenetResult<PaginatedResult<TenantGroup>>> + Send;
}

/// Scoped many-to-many membership of users in tenant groups.
///
/// `add` is strict and transactional: one bad id fails the whole batch with
/// nothing applied. `remove` is tolerant cleanup: malformed ids are skipped
/// and absent rows are no-ops.
pub trait GroupMemberRepository: Send + Sync {
    /// Existence probe. Malformed ids yield `false`, never an error.
    fn has(
        &self,
        tenant_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> impl Future<Output = TenetResult<bool>> + Send;

    fn add(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        user_ids: &[String],
    ) -> impl Future<Output = TenetResult<()>> + Send;

    fn remove(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        user_ids: &[String],
    ) -> impl Future<Output = TenetResult<()>> + Send;

    /// The group's users, joined through the membership rows.
    fn get_collection(
        &self,
        tenant_id: IdentityKey,
        group_id: IdentityKey,
        query: CollectionQuery,
    ) -> impl Future<Output = TenetResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// API keys & permissions
// ---------------------------------------------------------------------------

pub trait ApiKeyRepository: Send + Sync {
    /// Returns the stored key and the full key string, shown exactly once.
    fn create(
        &self,
        input: CreateApiKey,
    ) -> impl Future<Output = TenetResult<(ApiKey, String)>> + Send;
    fn get_by_key_id(&self, key_id: &str) -> impl Future<Output = TenetResult<ApiKey>> + Send;
    /// Disable the key; the row is kept for audit trails.
    fn revoke(&self, id: IdentityKey) -> impl Future<Output = TenetResult<()>> + Send;
    fn list_by_user(
        &self,
        user_id: IdentityKey,
        pagination: Pagination,
    ) -> impl Future<Output = TenetResult<PaginatedResult<ApiKey>>> + Send;
}

pub trait PermissionGrantRepository: Send + Sync {
    /// Grant an action globally (`tenant_id = None`) or scoped to a tenant.
    /// Granting an existing permission is a no-op.
    fn grant(
        &self,
        user_id: IdentityKey,
        action: &str,
        tenant_id: Option<IdentityKey>,
    ) -> impl Future<Output = TenetResult<()>> + Send;
    fn revoke(
        &self,
        user_id: IdentityKey,
        action: &str,
        tenant_id: Option<IdentityKey>,
    ) -> impl Future<Output = TenetResult<()>> + Send;
    fn get_user_grants(
        &self,
        user_id: IdentityKey,
    ) -> impl Future<Output = TenetResult<Vec<PermissionGrant>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit log & rate counters
// ---------------------------------------------------------------------------

pub trait AuditLogRepository: Send + Sync {
    fn append(
        &self,
        entry: CreateAuditLogEntry,
    ) -> impl Future<Output = TenetResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = TenetResult<PaginatedResult<AuditLogEntry>>> + Send;
}

pub trait RateCounterRepository: Send + Sync {
    /// Atomically increment the counter for `key` within its current window,
    /// starting a fresh window of length `window` when none is active.
    /// Returns the post-increment count.
    fn increment(
        &self,
        key: &str,
        window: Duration,
    ) -> impl Future<Output = TenetResult<u64>> + Send;

    /// Remove counters whose window has lapsed. Housekeeping only:
    /// `increment` resets lapsed windows by itself.
    fn cleanup_expired(&self) -> impl Future<Output = TenetResult<u64>> + Send;
}
