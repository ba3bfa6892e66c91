//! Integration tests for the rate counter repository using in-memory
//! SurrealDB.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenet_core::repository::RateCounterRepository;
use tenet_db::repository::SurrealRateCounterRepository;

async fn setup() -> SurrealRateCounterRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenet_db::run_migrations(&db).await.unwrap();
    SurrealRateCounterRepository::new(db)
}

#[tokio::test]
async fn increment_counts_within_the_window() {
    let repo = setup().await;
    let window = Duration::from_secs(60);

    assert_eq!(repo.increment("auth-203.0.113.9", window).await.unwrap(), 1);
    assert_eq!(repo.increment("auth-203.0.113.9", window).await.unwrap(), 2);
    assert_eq!(repo.increment("auth-203.0.113.9", window).await.unwrap(), 3);
}

#[tokio::test]
async fn keys_count_independently() {
    let repo = setup().await;
    let window = Duration::from_secs(60);

    repo.increment("auth-a", window).await.unwrap();
    repo.increment("auth-a", window).await.unwrap();

    assert_eq!(repo.increment("auth-b", window).await.unwrap(), 1);
    assert_eq!(repo.increment("auth-a", window).await.unwrap(), 3);
}

#[tokio::test]
async fn lapsed_window_restarts_the_count() {
    let repo = setup().await;
    let window = Duration::from_millis(200);

    assert_eq!(repo.increment("auth-reset", window).await.unwrap(), 1);
    assert_eq!(repo.increment("auth-reset", window).await.unwrap(), 2);

    tokio::time::sleep(Duration::from_millis(400)).await;

    // The old window lapsed, so the count starts over.
    assert_eq!(repo.increment("auth-reset", window).await.unwrap(), 1);
}

#[tokio::test]
async fn cleanup_removes_only_lapsed_counters() {
    let repo = setup().await;

    repo.increment("short-lived", Duration::from_millis(200))
        .await
        .unwrap();
    repo.increment("long-lived", Duration::from_secs(60))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(repo.cleanup_expired().await.unwrap(), 1);

    // The surviving counter keeps its window and count.
    assert_eq!(
        repo.increment("long-lived", Duration::from_secs(60))
            .await
            .unwrap(),
        2
    );

    // Nothing left to clean.
    assert_eq!(repo.cleanup_expired().await.unwrap(), 0);
}
