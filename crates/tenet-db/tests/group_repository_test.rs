//! Integration tests for tenant groups and group membership using
//! in-memory SurrealDB.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenet_core::config::ModelConfig;
use tenet_core::error::TenetError;
use tenet_core::events::MemoryEmitter;
use tenet_core::identity::IdentityKey;
use tenet_core::models::tenant::CreateTenant;
use tenet_core::models::tenant_group::{CreateTenantGroup, UpdateTenantGroup};
use tenet_core::models::user::User;
use tenet_core::repository::{
    CollectionQuery, GroupMemberRepository, Pagination, SortSpec, TenantGroupRepository,
    TenantRepository, UserRepository,
};
use tenet_db::repository::{
    SurrealGroupMemberRepository, SurrealTenantGroupRepository, SurrealTenantRepository,
    SurrealUserRepository,
};

fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

struct Fixture {
    db: Surreal<Db>,
    tenant_id: IdentityKey,
    groups: SurrealTenantGroupRepository<Db>,
    members: SurrealGroupMemberRepository<Db>,
    emitter: Arc<MemoryEmitter>,
}

/// Helper: in-memory DB with one tenant and repositories wired up.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenet_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Test Tenant".into(),
        })
        .await
        .unwrap();

    let emitter = Arc::new(MemoryEmitter::new());
    let groups = SurrealTenantGroupRepository::new(db.clone());
    let members =
        SurrealGroupMemberRepository::new(db.clone(), ModelConfig::default(), emitter.clone());

    Fixture {
        db,
        tenant_id: tenant.id,
        groups,
        members,
        emitter,
    }
}

impl Fixture {
    /// Create a user and attach it to the fixture tenant.
    async fn tenant_user(&self, email: &str) -> User {
        let user = SurrealUserRepository::new(
            self.db.clone(),
            ModelConfig::default(),
            Arc::new(tenet_core::events::NullEmitter),
        )
        .create(
            attrs(json!({ "email": email, "password": "SuperSecret123!" })),
            false,
        )
        .await
        .unwrap();
        SurrealTenantRepository::new(self.db.clone())
            .add_user(self.tenant_id, user.id)
            .await
            .unwrap();
        user
    }
}

#[tokio::test]
async fn group_crud_roundtrip() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Engineers".into(),
        })
        .await
        .unwrap();
    assert_eq!(group.tenant_id, fx.tenant_id);
    assert_eq!(group.name, "Engineers");

    let fetched = fx.groups.get(fx.tenant_id, group.id).await.unwrap();
    assert_eq!(fetched.id, group.id);

    let renamed = fx
        .groups
        .update(
            fx.tenant_id,
            group.id,
            UpdateTenantGroup {
                name: Some("Platform".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Platform");

    fx.groups.delete(fx.tenant_id, group.id).await.unwrap();
    assert!(matches!(
        fx.groups.get(fx.tenant_id, group.id).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn group_names_are_unique_per_tenant() {
    let fx = setup().await;

    fx.groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Engineers".into(),
        })
        .await
        .unwrap();

    let duplicate = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Engineers".into(),
        })
        .await;
    assert!(matches!(duplicate, Err(TenetError::Conflict { .. })));

    // The same name is fine under another tenant.
    let other = SurrealTenantRepository::new(fx.db.clone())
        .create(CreateTenant {
            name: "Other Tenant".into(),
        })
        .await
        .unwrap();
    fx.groups
        .create(CreateTenantGroup {
            tenant_id: other.id,
            name: "Engineers".into(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn group_is_invisible_outside_its_tenant() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Hidden".into(),
        })
        .await
        .unwrap();

    let other = SurrealTenantRepository::new(fx.db.clone())
        .create(CreateTenant {
            name: "Foreign".into(),
        })
        .await
        .unwrap();

    assert!(matches!(
        fx.groups.get(other.id, group.id).await,
        Err(TenetError::NotFound { .. })
    ));
    assert!(matches!(
        fx.groups.delete(other.id, group.id).await,
        Err(TenetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn list_groups_with_pagination() {
    let fx = setup().await;

    for i in 0..4 {
        fx.groups
            .create(CreateTenantGroup {
                tenant_id: fx.tenant_id,
                name: format!("Group {i}"),
            })
            .await
            .unwrap();
    }

    let page = fx
        .groups
        .list_by_tenant(
            fx.tenant_id,
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
async fn membership_lifecycle() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Members".into(),
        })
        .await
        .unwrap();
    let alice = fx.tenant_user("alice@example.com").await;
    let bob = fx.tenant_user("bob@example.com").await;

    fx.members
        .add(
            fx.tenant_id,
            group.id,
            &[alice.id.decode(), bob.id.decode()],
        )
        .await
        .unwrap();

    assert!(
        fx.members
            .has(
                &fx.tenant_id.decode(),
                &group.id.decode(),
                &alice.id.decode()
            )
            .await
            .unwrap()
    );

    // Re-adding an existing member is idempotent.
    fx.members
        .add(fx.tenant_id, group.id, &[alice.id.decode()])
        .await
        .unwrap();

    let collection = fx
        .members
        .get_collection(fx.tenant_id, group.id, CollectionQuery::default())
        .await
        .unwrap();
    assert_eq!(collection.total, 2);

    fx.members
        .remove(fx.tenant_id, group.id, &[alice.id.decode()])
        .await
        .unwrap();
    assert!(
        !fx.members
            .has(
                &fx.tenant_id.decode(),
                &group.id.decode(),
                &alice.id.decode()
            )
            .await
            .unwrap()
    );

    let names = fx.emitter.names();
    assert!(names.contains(&"tenant_group.members_added".to_string()));
    assert!(names.contains(&"tenant_group.members_removed".to_string()));
}

#[tokio::test]
async fn add_is_strict_and_leaves_no_residue_on_failure() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Strict".into(),
        })
        .await
        .unwrap();
    let alice = fx.tenant_user("alice@example.com").await;

    let result = fx
        .members
        .add(
            fx.tenant_id,
            group.id,
            &[alice.id.decode(), "not-a-uuid".into()],
        )
        .await;
    assert!(matches!(result, Err(TenetError::BadRequest { .. })));

    // The valid id in the failed batch must not have been written.
    let collection = fx
        .members
        .get_collection(fx.tenant_id, group.id, CollectionQuery::default())
        .await
        .unwrap();
    assert_eq!(collection.total, 0);
}

#[tokio::test]
async fn add_rejects_users_outside_the_tenant() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Insiders".into(),
        })
        .await
        .unwrap();

    // A real user, but never attached to the tenant.
    let outsider = SurrealUserRepository::new(
        fx.db.clone(),
        ModelConfig::default(),
        Arc::new(tenet_core::events::NullEmitter),
    )
    .create(
        attrs(json!({ "email": "outsider@example.com", "password": "SuperSecret123!" })),
        false,
    )
    .await
    .unwrap();

    let result = fx
        .members
        .add(fx.tenant_id, group.id, &[outsider.id.decode()])
        .await;
    assert!(matches!(result, Err(TenetError::BadRequest { .. })));
}

#[tokio::test]
async fn add_to_unknown_group_is_not_found() {
    let fx = setup().await;
    let alice = fx.tenant_user("alice@example.com").await;

    let ghost = IdentityKey::generate();
    let result = fx
        .members
        .add(fx.tenant_id, ghost, &[alice.id.decode()])
        .await;
    assert!(matches!(result, Err(TenetError::NotFound { .. })));
}

#[tokio::test]
async fn remove_skips_malformed_ids() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Lenient".into(),
        })
        .await
        .unwrap();
    let alice = fx.tenant_user("alice@example.com").await;
    fx.members
        .add(fx.tenant_id, group.id, &[alice.id.decode()])
        .await
        .unwrap();

    // The malformed id is skipped, the valid one is removed.
    fx.members
        .remove(
            fx.tenant_id,
            group.id,
            &["garbage".into(), alice.id.decode()],
        )
        .await
        .unwrap();

    let collection = fx
        .members
        .get_collection(fx.tenant_id, group.id, CollectionQuery::default())
        .await
        .unwrap();
    assert_eq!(collection.total, 0);
}

#[tokio::test]
async fn has_returns_false_for_malformed_ids() {
    let fx = setup().await;
    assert!(
        !fx.members
            .has("not-a-uuid", "also-not", "nope")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn collection_sorts_by_whitelisted_columns_only() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Sorted".into(),
        })
        .await
        .unwrap();
    let alice = fx.tenant_user("alice@example.com").await;
    let bob = fx.tenant_user("bob@example.com").await;
    fx.members
        .add(
            fx.tenant_id,
            group.id,
            &[alice.id.decode(), bob.id.decode()],
        )
        .await
        .unwrap();

    let descending = fx
        .members
        .get_collection(
            fx.tenant_id,
            group.id,
            CollectionQuery {
                sort: Some(SortSpec {
                    field: "email".into(),
                    descending: true,
                }),
                pagination: Pagination::default(),
            },
        )
        .await
        .unwrap();
    let emails: Vec<&str> = descending
        .items
        .iter()
        .map(|user| user.email.as_str())
        .collect();
    assert_eq!(emails, vec!["bob@example.com", "alice@example.com"]);

    let rejected = fx
        .members
        .get_collection(
            fx.tenant_id,
            group.id,
            CollectionQuery {
                sort: Some(SortSpec {
                    field: "password".into(),
                    descending: false,
                }),
                pagination: Pagination::default(),
            },
        )
        .await;
    assert!(matches!(rejected, Err(TenetError::BadRequest { .. })));
}

#[tokio::test]
async fn group_delete_cascades_memberships() {
    let fx = setup().await;

    let group = fx
        .groups
        .create(CreateTenantGroup {
            tenant_id: fx.tenant_id,
            name: "Doomed".into(),
        })
        .await
        .unwrap();
    let alice = fx.tenant_user("alice@example.com").await;
    fx.members
        .add(fx.tenant_id, group.id, &[alice.id.decode()])
        .await
        .unwrap();

    fx.groups.delete(fx.tenant_id, group.id).await.unwrap();

    assert!(
        !fx.members
            .has(
                &fx.tenant_id.decode(),
                &group.id.decode(),
                &alice.id.decode()
            )
            .await
            .unwrap()
    );
}
