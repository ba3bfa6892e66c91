//! Integration tests for API keys and permission grants using in-memory
//! SurrealDB.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenet_core::config::ModelConfig;
use tenet_core::error::TenetError;
use tenet_core::events::NullEmitter;
use tenet_core::identity::IdentityKey;
use tenet_core::models::api_key::CreateApiKey;
use tenet_core::models::permission::PermissionSet;
use tenet_core::models::tenant::CreateTenant;
use tenet_core::models::user::User;
use tenet_core::repository::{
    ApiKeyRepository, Pagination, PermissionGrantRepository, TenantRepository, UserRepository,
};
use tenet_db::repository::{
    SurrealApiKeyRepository, SurrealPermissionGrantRepository, SurrealTenantRepository,
    SurrealUserRepository, hash_key_secret,
};

fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

async fn setup() -> (Surreal<Db>, User) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenet_db::run_migrations(&db).await.unwrap();

    let user = SurrealUserRepository::new(db.clone(), ModelConfig::default(), Arc::new(NullEmitter))
        .create(
            attrs(json!({ "email": "owner@example.com", "password": "SuperSecret123!" })),
            false,
        )
        .await
        .unwrap();

    (db, user)
}

#[tokio::test]
async fn create_api_key_returns_the_full_key_once() {
    let (db, user) = setup().await;
    let repo = SurrealApiKeyRepository::new(db);

    let (key, full) = repo
        .create(CreateApiKey {
            user_id: user.id,
            name: "ci".into(),
            referer: None,
            ip_address: None,
            rate_limit: None,
        })
        .await
        .unwrap();

    // Full key shape: tenet_<key_id>_<secret>.
    let parts: Vec<&str> = full.splitn(3, '_').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "tenet");
    assert_eq!(parts[1], key.key_id);
    assert_eq!(parts[1].len(), 16);
    assert_eq!(parts[2].len(), 43);

    // Only the hash of the secret is stored.
    assert_eq!(key.secret_hash, hash_key_secret(parts[2]));
    assert_ne!(key.secret_hash, parts[2]);
    assert!(key.enabled);
    assert_eq!(key.user_id, user.id);
}

#[tokio::test]
async fn get_by_key_id_roundtrip() {
    let (db, user) = setup().await;
    let repo = SurrealApiKeyRepository::new(db);

    let (key, _full) = repo
        .create(CreateApiKey {
            user_id: user.id,
            name: "lookup".into(),
            referer: Some("https://app.example.com".into()),
            ip_address: Some("203.0.113.9".into()),
            rate_limit: Some(120),
        })
        .await
        .unwrap();

    let fetched = repo.get_by_key_id(&key.key_id).await.unwrap();
    assert_eq!(fetched.id, key.id);
    assert_eq!(fetched.referer.as_deref(), Some("https://app.example.com"));
    assert_eq!(fetched.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(fetched.rate_limit, Some(120));

    assert!(matches!(
        repo.get_by_key_id("ffffffffffffffff").await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn revoke_disables_but_keeps_the_key() {
    let (db, user) = setup().await;
    let repo = SurrealApiKeyRepository::new(db);

    let (key, _full) = repo
        .create(CreateApiKey {
            user_id: user.id,
            name: "revoked".into(),
            referer: None,
            ip_address: None,
            rate_limit: None,
        })
        .await
        .unwrap();

    repo.revoke(key.id).await.unwrap();

    let fetched = repo.get_by_key_id(&key.key_id).await.unwrap();
    assert!(!fetched.enabled);

    assert!(matches!(
        repo.revoke(IdentityKey::generate()).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn create_for_unknown_user_is_not_found() {
    let (db, _user) = setup().await;
    let repo = SurrealApiKeyRepository::new(db);

    let result = repo
        .create(CreateApiKey {
            user_id: IdentityKey::generate(),
            name: "orphan".into(),
            referer: None,
            ip_address: None,
            rate_limit: None,
        })
        .await;
    assert!(matches!(result, Err(TenetError::NotFound { .. })));
}

#[tokio::test]
async fn list_keys_by_user_with_pagination() {
    let (db, user) = setup().await;
    let repo = SurrealApiKeyRepository::new(db);

    for i in 0..4 {
        repo.create(CreateApiKey {
            user_id: user.id,
            name: format!("key-{i}"),
            referer: None,
            ip_address: None,
            rate_limit: None,
        })
        .await
        .unwrap();
    }

    let page = repo
        .list_by_user(
            user.id,
            Pagination {
                offset: 0,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 4);
}

#[tokio::test]
async fn grant_and_resolve_permissions() {
    let (db, user) = setup().await;
    let repo = SurrealPermissionGrantRepository::new(db.clone());
    let tenant = SurrealTenantRepository::new(db)
        .create(CreateTenant {
            name: "Scoped".into(),
        })
        .await
        .unwrap();

    repo.grant(user.id, "users.read", None).await.unwrap();
    repo.grant(user.id, "users.write", Some(tenant.id))
        .await
        .unwrap();

    let grants = repo.get_user_grants(user.id).await.unwrap();
    assert_eq!(grants.len(), 2);

    let set = PermissionSet::from_grants(&grants);
    assert!(set.contains("users.read", None));
    assert!(set.contains("users.read", Some(tenant.id)));
    assert!(set.contains("users.write", Some(tenant.id)));
    assert!(!set.contains("users.write", None));
    assert!(set.has_all(&["users.read", "users.write"], Some(tenant.id)));
    assert!(!set.has_all(&["users.read", "users.write"], None));
}

#[tokio::test]
async fn granting_twice_stores_one_grant() {
    let (db, user) = setup().await;
    let repo = SurrealPermissionGrantRepository::new(db);

    repo.grant(user.id, "users.read", None).await.unwrap();
    repo.grant(user.id, "users.read", None).await.unwrap();

    let grants = repo.get_user_grants(user.id).await.unwrap();
    assert_eq!(grants.len(), 1);
}

#[tokio::test]
async fn revoke_removes_only_the_matching_grant() {
    let (db, user) = setup().await;
    let repo = SurrealPermissionGrantRepository::new(db.clone());
    let tenant = SurrealTenantRepository::new(db)
        .create(CreateTenant {
            name: "Scoped".into(),
        })
        .await
        .unwrap();

    repo.grant(user.id, "users.read", None).await.unwrap();
    repo.grant(user.id, "users.read", Some(tenant.id))
        .await
        .unwrap();

    // Revoking the scoped grant leaves the global one in place.
    repo.revoke(user.id, "users.read", Some(tenant.id))
        .await
        .unwrap();
    let grants = repo.get_user_grants(user.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert!(grants[0].tenant_id.is_none());

    // Revoking an absent grant is a no-op.
    repo.revoke(user.id, "users.admin", None).await.unwrap();
}

#[tokio::test]
async fn grant_requires_existing_user_and_tenant() {
    let (db, user) = setup().await;
    let repo = SurrealPermissionGrantRepository::new(db);

    assert!(matches!(
        repo.grant(IdentityKey::generate(), "users.read", None).await,
        Err(TenetError::NotFound { .. })
    ));
    assert!(matches!(
        repo.grant(user.id, "users.read", Some(IdentityKey::generate()))
            .await,
        Err(TenetError::NotFound { .. })
    ));
}
