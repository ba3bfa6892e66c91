//! SurrealDB implementation of [`ApiKeyRepository`].
//!
//! Full keys have the shape `tenet_<key_id>_<secret>`. Only the SHA-256
//! hash of the secret is stored; the full key string is returned exactly
//! once, at creation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::TenetResult;
use tenet_core::identity::IdentityKey;
use tenet_core::models::api_key::{ApiKey, CreateApiKey};
use tenet_core::repository::{ApiKeyRepository, PaginatedResult, Pagination};

use crate::error::DbError;

/// Prefix of every full key string.
pub const KEY_PREFIX: &str = "tenet";

/// Generate a random public key id (16 hex chars).
fn generate_key_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    hex::encode(bytes)
}

/// Generate a random key secret (32 bytes → 43 base64url chars).
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a key secret using SHA-256.
pub fn hash_key_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, SurrealValue)]
struct ApiKeyRow {
    user_id: String,
    name: String,
    key_id: String,
    secret_hash: String,
    referer: Option<String>,
    ip_address: Option<String>,
    rate_limit: Option<u32>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ApiKeyRowWithId {
    record_id: String,
    user_id: String,
    name: String,
    key_id: String,
    secret_hash: String,
    referer: Option<String>,
    ip_address: Option<String>,
    rate_limit: Option<u32>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_api_key(id: IdentityKey, row: ApiKeyRow) -> Result<ApiKey, DbError> {
    let user_id = IdentityKey::from_storage_key(&row.user_id)
        .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))?;
    Ok(ApiKey {
        id,
        user_id,
        name: row.name,
        key_id: row.key_id,
        secret_hash: row.secret_hash,
        referer: row.referer,
        ip_address: row.ip_address,
        rate_limit: row.rate_limit,
        enabled: row.enabled,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl ApiKeyRowWithId {
    fn try_into_api_key(self) -> Result<ApiKey, DbError> {
        let id = IdentityKey::from_storage_key(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid api key record: {e}")))?;
        row_to_api_key(
            id,
            ApiKeyRow {
                user_id: self.user_id,
                name: self.name,
                key_id: self.key_id,
                secret_hash: self.secret_hash,
                referer: self.referer,
                ip_address: self.ip_address,
                rate_limit: self.rate_limit,
                enabled: self.enabled,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        )
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the API key repository.
#[derive(Clone)]
pub struct SurrealApiKeyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealApiKeyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn user_exists(&self, user_id: IdentityKey) -> TenetResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record('user', $id) GROUP ALL")
            .bind(("id", user_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> ApiKeyRepository for SurrealApiKeyRepository<C> {
    async fn create(&self, input: CreateApiKey) -> TenetResult<(ApiKey, String)> {
        if !self.user_exists(input.user_id).await? {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: input.user_id.decode(),
            }
            .into());
        }

        let id = IdentityKey::generate();
        let key_id = generate_key_id();
        let raw_secret = generate_secret();
        let secret_hash = hash_key_secret(&raw_secret);
        let full_key = format!("{KEY_PREFIX}_{key_id}_{raw_secret}");

        let result = self
            .db
            .query(
                "CREATE type::record('api_key', $id) SET \
                 user_id = $user_id, \
                 name = $name, \
                 key_id = $key_id, \
                 secret_hash = $secret_hash, \
                 referer = $referer, \
                 ip_address = $ip_address, \
                 rate_limit = $rate_limit, \
                 enabled = true",
            )
            .bind(("id", id.storage_key()))
            .bind(("user_id", input.user_id.storage_key()))
            .bind(("name", input.name))
            .bind(("key_id", key_id))
            .bind(("secret_hash", secret_hash))
            .bind(("referer", input.referer))
            .bind(("ip_address", input.ip_address))
            .bind(("rate_limit", input.rate_limit))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "api_key".into(),
            id: id.decode(),
        })?;

        let key = row_to_api_key(id, row)?;
        Ok((key, full_key))
    }

    async fn get_by_key_id(&self, key_id: &str) -> TenetResult<ApiKey> {
        let key_id_owned = key_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM api_key \
                 WHERE key_id = $key_id",
            )
            .bind(("key_id", key_id_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "api_key".into(),
            id: format!("key_id={key_id_owned}"),
        })?;

        row.try_into_api_key().map_err(Into::into)
    }

    async fn revoke(&self, id: IdentityKey) -> TenetResult<()> {
        let result = self
            .db
            .query(
                "UPDATE type::record('api_key', $id) SET \
                 enabled = false, \
                 updated_at = time::now()",
            )
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "api_key".into(),
                id: id.decode(),
            }
            .into());
        }

        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: IdentityKey,
        pagination: Pagination,
    ) -> TenetResult<PaginatedResult<ApiKey>> {
        let user_key = user_id.storage_key();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM api_key \
                 WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("user_id", user_key.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM api_key \
                 WHERE user_id = $user_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("user_id", user_key))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_api_key())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
