//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Each user gets a
//! random salt at creation; rehashes on password change reuse it, so
//! the salt column stays stable for the row's lifetime.
//!
//! Mutations run through the resource schema first, then write, then
//! record an audit entry and emit the matching domain event.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{Map, Value, json};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::config::ModelConfig;
use tenet_core::error::{TenetError, TenetResult};
use tenet_core::events::{DomainEvent, EventEmitter};
use tenet_core::identity::IdentityKey;
use tenet_core::models::audit::{ActorType, AuditOutcome, CreateAuditLogEntry};
use tenet_core::models::user::User;
use tenet_core::models::verification::EmailVerification;
use tenet_core::password::{MinLengthPolicy, PasswordPolicy};
use tenet_core::repository::{AuditLogRepository, PaginatedResult, Pagination, UserRepository};
use tenet_core::schema::{self, ResourceSchema, canonical_bool};
use tracing::info;

use crate::error::DbError;
use crate::repository::audit::SurrealAuditLogRepository;

#[derive(Debug, SurrealValue)]
struct UserRow {
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

/// DB-side row struct that includes the record ID via `meta::id(id)`.
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

impl UserRow {
    fn into_user(self, id: IdentityKey) -> Result<User, DbError> {
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

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = IdentityKey::from_storage_key(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))?;
        UserRow {
            email: self.email,
            password_hash: self.password_hash,
            salt: self.salt,
            firstname: self.firstname,
            lastname: self.lastname,
            meta: self.meta,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

#[derive(Debug, SurrealValue)]
struct VerificationRow {
    user_id: String,
    email: String,
    key: String,
    enable_on_success: bool,
    created_at: DateTime<Utc>,
}

impl VerificationRow {
    fn into_verification(self) -> Result<EmailVerification, DbError> {
        let user_id = IdentityKey::from_storage_key(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user key: {e}")))?;
        Ok(EmailVerification {
            user_id,
            email: self.email,
            key: self.key,
            enable_on_success: self.enable_on_success,
            created_at: self.created_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Generate a fresh random salt in PHC b64 form.
fn generate_salt() -> String {
    SaltString::generate(&mut argon2::password_hash::rand_core::OsRng)
        .as_str()
        .to_owned()
}

/// Hash a password with Argon2id using OWASP-recommended parameters and
/// the caller-supplied salt.
fn hash_password(password: &str, salt: &str) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let salt = SaltString::from_b64(salt)
        .map_err(|e| DbError::Hash(format!("invalid salt: {e}")))?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Hash(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Generate a random verification key (32 hex chars).
fn generate_verification_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Verify a password against an Argon2id hash.
///
/// Public for use by login surfaces built on this crate.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Hash(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Hash(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the User repository.
///
/// Carries the resource schema, model configuration, password policy and
/// event emitter, so validation, storage, auditing and event emission run
/// as one flow per operation.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    schema: ResourceSchema,
    config: ModelConfig,
    policy: Arc<dyn PasswordPolicy>,
    emitter: Arc<dyn EventEmitter>,
    audit: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>, config: ModelConfig, emitter: Arc<dyn EventEmitter>) -> Self {
        let audit = SurrealAuditLogRepository::new(db.clone());
        Self {
            db,
            schema: schema::users(),
            config,
            policy: Arc::new(MinLengthPolicy::default()),
            emitter,
            audit,
        }
    }

    /// Replace the password acceptability policy.
    pub fn with_policy(mut self, policy: Arc<dyn PasswordPolicy>) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch(&self, id: IdentityKey) -> TenetResult<Option<User>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_user(id)?)),
            None => Ok(None),
        }
    }

    async fn email_in_use(&self, email: &str, exclude: Option<IdentityKey>) -> TenetResult<bool> {
        let mut query = String::from("SELECT count() AS total FROM user WHERE email = $email");
        if exclude.is_some() {
            query.push_str(" AND meta::id(id) != $exclude");
        }
        query.push_str(" GROUP ALL");

        let mut builder = self.db.query(&query).bind(("email", email.to_string()));
        if let Some(exclude) = exclude {
            builder = builder.bind(("exclude", exclude.storage_key()));
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    /// Store (or replace) the pending verification for a user and announce
    /// it so subscribers can deliver the key.
    async fn store_verification(
        &self,
        user: &User,
        email: &str,
        enable_on_success: bool,
    ) -> TenetResult<()> {
        let key = generate_verification_key();
        let id_str = user.id.storage_key();

        let result = self
            .db
            .query(
                "UPSERT type::record('email_verification', $id) SET \
                 user_id = $user_id, \
                 email = $email, \
                 key = $key, \
                 enable_on_success = $enable_on_success, \
                 created_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", id_str))
            .bind(("email", email.to_string()))
            .bind(("key", key))
            .bind(("enable_on_success", enable_on_success))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        // The key itself is not broadcast; subscribers that deliver it read
        // the pending record instead.
        self.emitter.emit(DomainEvent::new(
            "users.email_verification_requested",
            json!({
                "id": user.id.decode(),
                "email": email,
            }),
        ));
        Ok(())
    }

    async fn delete_verification(&self, id: IdentityKey) -> TenetResult<()> {
        self.db
            .query("DELETE type::record('email_verification', $id)")
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn record_audit(
        &self,
        action: &str,
        resource_id: Option<IdentityKey>,
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
                resource_id,
                tenant_id: None,
                outcome: AuditOutcome::Success,
                metadata,
            })
            .await?;
        Ok(())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(
        &self,
        attrs: Map<String, Value>,
        include_verification: bool,
    ) -> TenetResult<User> {
        self.schema.validate_create(&attrs)?;
        if let (Some(meta_schema), Some(Value::Object(meta))) =
            (&self.config.meta_schema, attrs.get("meta"))
        {
            meta_schema.validate(meta)?;
        }

        // Addresses are canonicalized to lowercase before uniqueness checks.
        let email = attrs
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let password = attrs
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !self.policy.acceptable(password) {
            return Err(TenetError::BadRequest {
                message: "password does not satisfy the password policy".into(),
            });
        }
        if self.email_in_use(&email, None).await? {
            return Err(TenetError::Conflict {
                message: format!("email already in use: {email}"),
            });
        }

        let salt = generate_salt();
        let password_hash = hash_password(password, &salt)?;

        // A requested signup verification is honored regardless of the
        // config switch; the switch only gates the update-path diversion.
        let enabled = if include_verification {
            // Stays disabled until the key is redeemed.
            false
        } else {
            attrs.get("enabled").and_then(canonical_bool).unwrap_or(true)
        };
        let firstname = attrs
            .get("firstname")
            .and_then(Value::as_str)
            .map(String::from);
        let lastname = attrs
            .get("lastname")
            .and_then(Value::as_str)
            .map(String::from);
        let meta = match attrs.get("meta") {
            Some(value) => value.clone(),
            None => Value::Object(Map::new()),
        };

        let id = IdentityKey::generate();
        let id_str = id.storage_key();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, \
                 password_hash = $password_hash, \
                 salt = $salt, \
                 firstname = $firstname, \
                 lastname = $lastname, \
                 meta = $meta, \
                 enabled = $enabled",
            )
            .bind(("id", id_str.clone()))
            .bind(("email", email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("salt", salt))
            .bind(("firstname", firstname))
            .bind(("lastname", lastname))
            .bind(("meta", meta))
            .bind(("enabled", enabled))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;
        let user = row.into_user(id)?;

        if include_verification {
            self.store_verification(&user, &email, true).await?;
        }

        self.record_audit("users.create", Some(id), self.schema.redact(&attrs))
            .await?;
        self.emitter.emit(DomainEvent::new(
            "users.created",
            Value::Object(user.public_attributes()),
        ));

        Ok(user)
    }

    async fn get(&self, id: IdentityKey) -> TenetResult<User> {
        let user = self.fetch(id).await?.ok_or_else(|| TenetError::NotFound {
            entity: "user".into(),
            id: id.decode(),
        })?;

        self.record_audit("users.get", Some(id), Map::new()).await?;
        self.emitter.emit(DomainEvent::new(
            "users.read",
            Value::Object(user.public_attributes()),
        ));

        Ok(user)
    }

    async fn find(&self, id: IdentityKey) -> TenetResult<Option<User>> {
        self.fetch(id).await
    }

    async fn get_by_email(&self, email: &str) -> TenetResult<User> {
        let email = email.to_lowercase();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(
        &self,
        id: IdentityKey,
        attrs: Map<String, Value>,
        check_email_verification: bool,
    ) -> TenetResult<User> {
        let current = self.fetch(id).await?.ok_or_else(|| TenetError::NotFound {
            entity: "user".into(),
            id: id.decode(),
        })?;
        if attrs.is_empty() {
            return Ok(current);
        }
        self.schema.validate_update(&attrs)?;

        let mut sets: Vec<&str> = Vec::new();
        let mut changed: Vec<&str> = Vec::new();

        // meta merges shallowly into the stored object; the merged result
        // is what gets validated and written.
        let mut merged_meta: Option<Map<String, Value>> = None;
        if let Some(Value::Object(incoming)) = attrs.get("meta") {
            let mut merged = current.meta.clone();
            for (key, value) in incoming {
                merged.insert(key.clone(), value.clone());
            }
            if let Some(meta_schema) = &self.config.meta_schema {
                meta_schema.validate(&merged)?;
            }
            merged_meta = Some(merged);
            sets.push("meta = $meta");
            changed.push("meta");
        }

        let mut password_hash: Option<String> = None;
        if let Some(password) = attrs.get("password").and_then(Value::as_str) {
            if !self.policy.acceptable(password) {
                return Err(TenetError::BadRequest {
                    message: "password does not satisfy the password policy".into(),
                });
            }
            // The per-user salt is fixed at creation and reused on rehash.
            password_hash = Some(hash_password(password, &current.salt)?);
            sets.push("password_hash = $password_hash");
            changed.push("password");
        }

        let mut new_email: Option<String> = None;
        if let Some(email) = attrs.get("email").and_then(Value::as_str) {
            let email = email.to_lowercase();
            if email != current.email {
                if self.email_in_use(&email, Some(id)).await? {
                    return Err(TenetError::Conflict {
                        message: format!("email already in use: {email}"),
                    });
                }
                if check_email_verification && self.config.email_verification {
                    // Diverted: the address applies when the key is redeemed.
                    self.store_verification(&current, &email, false).await?;
                } else {
                    new_email = Some(email);
                    sets.push("email = $email");
                    changed.push("email");
                }
            }
        }

        let mut firstname: Option<String> = None;
        if let Some(value) = attrs.get("firstname").and_then(Value::as_str) {
            firstname = Some(value.to_string());
            sets.push("firstname = $firstname");
            changed.push("firstname");
        }
        let mut lastname: Option<String> = None;
        if let Some(value) = attrs.get("lastname").and_then(Value::as_str) {
            lastname = Some(value.to_string());
            sets.push("lastname = $lastname");
            changed.push("lastname");
        }
        let mut enabled: Option<bool> = None;
        if let Some(flag) = attrs.get("enabled").and_then(canonical_bool) {
            enabled = Some(flag);
            sets.push("enabled = $enabled");
            changed.push("enabled");
        }

        if sets.is_empty() {
            // Everything was diverted or already current; nothing to write.
            return Ok(current);
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('user', $id) SET {}", sets.join(", "));
        let mut builder = self.db.query(&query).bind(("id", id.storage_key()));
        if let Some(meta) = merged_meta {
            builder = builder.bind(("meta", Value::Object(meta)));
        }
        if let Some(password_hash) = password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(email) = new_email {
            builder = builder.bind(("email", email));
        }
        if let Some(firstname) = firstname {
            builder = builder.bind(("firstname", firstname));
        }
        if let Some(lastname) = lastname {
            builder = builder.bind(("lastname", lastname));
        }
        if let Some(enabled) = enabled {
            builder = builder.bind(("enabled", enabled));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id.decode(),
        })?;
        let updated = row.into_user(id)?;

        // The audit row records whether the password changed, never its value.
        let mut audit_payload = self.schema.redact(&attrs);
        if audit_payload.contains_key("password") {
            audit_payload.insert("password".into(), Value::String("updated".into()));
        }
        self.record_audit("users.update", Some(id), audit_payload)
            .await?;
        self.emitter.emit(DomainEvent::new(
            "users.updated",
            json!({
                "id": id.decode(),
                "previous": Value::Object(current.public_attributes()),
                "current": Value::Object(updated.public_attributes()),
                "changed": changed,
            }),
        ));

        Ok(updated)
    }

    async fn delete(&self, id: IdentityKey) -> TenetResult<()> {
        let user = self.fetch(id).await?.ok_or_else(|| TenetError::NotFound {
            entity: "user".into(),
            id: id.decode(),
        })?;

        // Dependent rows go in the same transaction as the user row.
        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::record('user', $id); \
                 DELETE type::record('email_verification', $id); \
                 DELETE group_member WHERE user_id = $id; \
                 DELETE tenant_user WHERE user_id = $id; \
                 DELETE api_key WHERE user_id = $id; \
                 DELETE permission_grant WHERE user_id = $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.storage_key()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        let public = user.public_attributes();
        self.record_audit("users.delete", Some(id), public.clone())
            .await?;
        self.emitter
            .emit(DomainEvent::new("users.deleted", Value::Object(public)));

        Ok(())
    }

    async fn verify_email_key(&self, user_id: &str, key: &str) -> TenetResult<bool> {
        let Ok(id) = IdentityKey::encode(user_id) else {
            info!(user_id, "email verification with malformed user id");
            return Ok(false);
        };
        let Some(pending) = self.pending_verification(id).await? else {
            info!(user_id, "email verification without pending record");
            return Ok(false);
        };
        if pending.key != key {
            info!(user_id, "email verification key mismatch");
            return Ok(false);
        }
        let Some(user) = self.fetch(id).await? else {
            // The account is gone; drop the stale record.
            self.delete_verification(id).await?;
            return Ok(false);
        };

        // Single use: drop the record before applying, so a replay of the
        // same key can never succeed.
        self.delete_verification(id).await?;

        if pending.email != user.email && self.email_in_use(&pending.email, Some(id)).await? {
            info!(user_id, "verified email already taken");
            return Ok(false);
        }

        let query = if pending.enable_on_success {
            "UPDATE type::record('user', $id) SET email = $email, \
             enabled = true, updated_at = time::now()"
        } else {
            "UPDATE type::record('user', $id) SET email = $email, \
             updated_at = time::now()"
        };
        let result = self
            .db
            .query(query)
            .bind(("id", id.storage_key()))
            .bind(("email", pending.email.clone()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        self.record_audit("users.email_verified", Some(id), Map::new())
            .await?;
        self.emitter.emit(DomainEvent::new(
            "users.email_verified",
            json!({ "id": id.decode(), "email": pending.email }),
        ));

        Ok(true)
    }

    async fn pending_verification(
        &self,
        user_id: IdentityKey,
    ) -> TenetResult<Option<EmailVerification>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('email_verification', $id)")
            .bind(("id", user_id.storage_key()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<VerificationRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_verification()?)),
            None => Ok(None),
        }
    }

    async fn list(&self, pagination: Pagination) -> TenetResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
