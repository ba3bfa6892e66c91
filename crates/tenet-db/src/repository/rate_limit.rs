//! SurrealDB implementation of [`RateCounterRepository`].
//!
//! Each counter is a single record keyed by the caller-supplied string, so
//! increment-or-reset runs as one UPSERT statement and stays atomic under
//! concurrent requests for the same key.

use std::time::Duration;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenet_core::error::TenetResult;
use tenet_core::repository::RateCounterRepository;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CounterRow {
    count: u64,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the rate counter repository.
#[derive(Clone)]
pub struct SurrealRateCounterRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRateCounterRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RateCounterRepository for SurrealRateCounterRepository<C> {
    async fn increment(&self, key: &str, window: Duration) -> TenetResult<u64> {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        // Windows beyond the datetime range clamp to the maximum.
        let expires_at = Utc::now()
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        // The count clause must run before the expiry clause: both inspect
        // the stored expires_at, and SET clauses apply in order.
        let result = self
            .db
            .query(
                "UPSERT type::record('rate_counter', $key) SET \
                 count = IF expires_at != NONE AND expires_at > time::now() \
                     THEN count + 1 ELSE 1 END, \
                 expires_at = IF expires_at != NONE AND expires_at > time::now() \
                     THEN expires_at ELSE $expires_at END",
            )
            .bind(("key", key.to_string()))
            .bind(("expires_at", expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<CounterRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "rate_counter".into(),
            id: key.to_string(),
        })?;

        Ok(row.count)
    }

    async fn cleanup_expired(&self) -> TenetResult<u64> {
        // Count lapsed counters first, then delete.
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM rate_counter \
                 WHERE expires_at < time::now() GROUP ALL",
            )
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE rate_counter WHERE expires_at < time::now()")
            .await
            .map_err(DbError::from)?;

        Ok(total)
    }
}
