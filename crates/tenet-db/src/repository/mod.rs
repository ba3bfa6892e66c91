//! SurrealDB repository implementations.

mod api_key;
mod audit;
mod group_member;
mod permission;
mod rate_limit;
mod tenant;
mod tenant_group;
mod user;

pub use api_key::{KEY_PREFIX, SurrealApiKeyRepository, hash_key_secret};
pub use audit::SurrealAuditLogRepository;
pub use group_member::SurrealGroupMemberRepository;
pub use permission::SurrealPermissionGrantRepository;
pub use rate_limit::SurrealRateCounterRepository;
pub use tenant::SurrealTenantRepository;
pub use tenant_group::SurrealTenantGroupRepository;
pub use user::{SurrealUserRepository, verify_password};
