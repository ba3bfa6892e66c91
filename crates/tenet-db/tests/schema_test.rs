//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenet_db::run_migrations(&db).await.unwrap();

    // Verify that key tables exist by querying INFO FOR DB.
    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("user"), "missing user table");
    assert!(info_str.contains("tenant"), "missing tenant table");
    assert!(info_str.contains("tenant_user"), "missing tenant_user table");
    assert!(
        info_str.contains("tenant_group"),
        "missing tenant_group table"
    );
    assert!(
        info_str.contains("group_member"),
        "missing group_member table"
    );
    assert!(info_str.contains("api_key"), "missing api_key table");
    assert!(
        info_str.contains("permission_grant"),
        "missing permission_grant table"
    );
    assert!(
        info_str.contains("email_verification"),
        "missing email_verification table"
    );
    assert!(
        info_str.contains("rate_counter"),
        "missing rate_counter table"
    );
    assert!(info_str.contains("audit_log"), "missing audit_log table");

    // Verify migration was recorded.
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Run twice — should not fail.
    tenet_db::run_migrations(&db).await.unwrap();
    tenet_db::run_migrations(&db).await.unwrap();

    // Verify only one migration record exists.
    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn can_create_record_after_migration() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenet_db::run_migrations(&db).await.unwrap();

    db.query("CREATE tenant SET name = 'ACME Corp'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let mut result = db
        .query("SELECT * FROM tenant WHERE name = 'ACME Corp'")
        .await
        .unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn unique_index_prevents_duplicate_emails() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenet_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE user SET \
         email = 'dup@example.com', \
         password_hash = 'x', \
         salt = 'y'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    // Attempt duplicate email — should fail.
    let result = db
        .query(
            "CREATE user SET \
             email = 'dup@example.com', \
             password_hash = 'x', \
             salt = 'y'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate email should be rejected");
}

#[tokio::test]
async fn audit_log_rejects_unknown_enum_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    tenet_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE audit_log SET \
         actor_type = 'System', \
         action = 'users.create', \
         outcome = 'Success', \
         metadata = {}",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query(
            "CREATE audit_log SET \
             actor_type = 'Robot', \
             action = 'users.create', \
             outcome = 'Success', \
             metadata = {}",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown actor_type should be rejected");
}
