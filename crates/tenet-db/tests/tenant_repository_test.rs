//! Integration tests for the tenant repository using in-memory SurrealDB.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenet_core::config::ModelConfig;
use tenet_core::error::TenetError;
use tenet_core::events::NullEmitter;
use tenet_core::models::tenant::{CreateTenant, UpdateTenant};
use tenet_core::models::user::User;
use tenet_core::repository::{Pagination, TenantRepository, UserRepository};
use tenet_db::repository::{SurrealTenantRepository, SurrealUserRepository};

fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

async fn setup() -> (Surreal<Db>, SurrealTenantRepository<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenet_db::run_migrations(&db).await.unwrap();
    let repo = SurrealTenantRepository::new(db.clone());
    (db, repo)
}

async fn create_user(db: &Surreal<Db>, email: &str) -> User {
    let repo = SurrealUserRepository::new(
        db.clone(),
        ModelConfig::default(),
        Arc::new(NullEmitter),
    );
    repo.create(
        attrs(json!({ "email": email, "password": "SuperSecret123!" })),
        false,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn tenant_crud_roundtrip() {
    let (_db, repo) = setup().await;

    let tenant = repo
        .create(CreateTenant {
            name: "ACME Corp".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.name, "ACME Corp");

    let fetched = repo.get(tenant.id).await.unwrap();
    assert_eq!(fetched.id, tenant.id);

    let renamed = repo
        .update(
            tenant.id,
            UpdateTenant {
                name: Some("ACME Inc".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "ACME Inc");

    repo.delete(tenant.id).await.unwrap();
    assert!(matches!(
        repo.get(tenant.id).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn delete_unknown_tenant_is_not_found() {
    let (_db, repo) = setup().await;

    let ghost = tenet_core::identity::IdentityKey::generate();
    assert!(matches!(
        repo.delete(ghost).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn user_membership_lifecycle() {
    let (db, repo) = setup().await;

    let tenant = repo
        .create(CreateTenant {
            name: "Members".into(),
        })
        .await
        .unwrap();
    let user = create_user(&db, "member@example.com").await;

    assert!(!repo.has_user(tenant.id, user.id).await.unwrap());

    repo.add_user(tenant.id, user.id).await.unwrap();
    assert!(repo.has_user(tenant.id, user.id).await.unwrap());

    // Attaching again is a no-op, not an error.
    repo.add_user(tenant.id, user.id).await.unwrap();
    let ids = repo.user_ids(tenant.id).await.unwrap();
    assert_eq!(ids, vec![user.id]);

    repo.remove_user(tenant.id, user.id).await.unwrap();
    assert!(!repo.has_user(tenant.id, user.id).await.unwrap());
    assert!(repo.user_ids(tenant.id).await.unwrap().is_empty());

    // Removing an absent membership is also a no-op.
    repo.remove_user(tenant.id, user.id).await.unwrap();
}

#[tokio::test]
async fn add_user_requires_existing_user_and_tenant() {
    let (db, repo) = setup().await;

    let tenant = repo
        .create(CreateTenant {
            name: "Strict".into(),
        })
        .await
        .unwrap();
    let user = create_user(&db, "strict@example.com").await;
    let ghost = tenet_core::identity::IdentityKey::generate();

    assert!(matches!(
        repo.add_user(tenant.id, ghost).await,
        Err(TenetError::NotFound { .. })
    ));
    assert!(matches!(
        repo.add_user(ghost, user.id).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn tenant_delete_cascades_memberships() {
    let (db, repo) = setup().await;

    let tenant = repo
        .create(CreateTenant {
            name: "Doomed".into(),
        })
        .await
        .unwrap();
    let user = create_user(&db, "survivor@example.com").await;
    repo.add_user(tenant.id, user.id).await.unwrap();

    repo.delete(tenant.id).await.unwrap();

    // The membership row went with the tenant; the user did not.
    assert!(!repo.has_user(tenant.id, user.id).await.unwrap());
    let user_repo = SurrealUserRepository::new(
        db.clone(),
        ModelConfig::default(),
        Arc::new(NullEmitter),
    );
    assert!(user_repo.find(user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn list_tenants_with_pagination() {
    let (_db, repo) = setup().await;

    for i in 0..4 {
        repo.create(CreateTenant {
            name: format!("Tenant {i}"),
        })
        .await
        .unwrap();
    }

    let page1 = repo
        .list(Pagination {
            offset: 0,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 3);
    assert_eq!(page1.total, 4);

    let page2 = repo
        .list(Pagination {
            offset: 3,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 1);
}
