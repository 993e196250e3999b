// src/repositories/sync_state_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::{run_blocking, ConnectionPool};
use crate::domain::SyncState;
use crate::error::{AppError, AppResult};

/// Durable partition -> last successful sync timestamp mapping
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn get(&self, partition: &str) -> AppResult<Option<SyncState>>;

    /// Overwrite unconditionally.
    async fn put(&self, state: &SyncState) -> AppResult<()>;

    /// Returns true if a timestamp was removed.
    async fn clear(&self, partition: &str) -> AppResult<bool>;
}

pub struct SqliteSyncStateStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteSyncStateStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStateStore for SqliteSyncStateStore {
    async fn get(&self, partition: &str) -> AppResult<Option<SyncState>> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT last_synced_at FROM sync_state WHERE partition = ?1",
                    params![partition],
                    |row| row.get(0),
                )
                .optional()?;

            raw.map(|value| {
                DateTime::parse_from_rfc3339(&value)
                    .map(|dt| SyncState::new(partition.clone(), dt.with_timezone(&Utc)))
                    .map_err(|e| {
                        AppError::Other(format!(
                            "Corrupt sync timestamp for '{}': {} ({})",
                            partition, value, e
                        ))
                    })
            })
            .transpose()
        })
        .await
    }

    async fn put(&self, state: &SyncState) -> AppResult<()> {
        let state = state.clone();

        run_blocking(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO sync_state (partition, last_synced_at) VALUES (?1, ?2)
                 ON CONFLICT(partition) DO UPDATE SET last_synced_at = excluded.last_synced_at",
                params![state.partition, state.last_synced_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, partition: &str) -> AppResult<bool> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let removed = conn.execute(
                "DELETE FROM sync_state WHERE partition = ?1",
                params![partition],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_pool;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_missing_partition_has_no_state() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteSyncStateStore::new(pool);

        assert!(store.get("anime").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_survives_new_store() {
        let (_dir, pool) = create_test_pool().unwrap();
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 3, 9, 30, 0).unwrap();

        {
            let store = SqliteSyncStateStore::new(pool.clone());
            store.put(&SyncState::new("library", first)).await.unwrap();
            store.put(&SyncState::new("library", second)).await.unwrap();
        }

        let reopened = SqliteSyncStateStore::new(pool);
        let state = reopened.get("library").await.unwrap().unwrap();
        assert_eq!(state.last_synced_at, second);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteSyncStateStore::new(pool);

        store.put(&SyncState::new("library", Utc::now())).await.unwrap();

        assert!(store.clear("library").await.unwrap());
        assert!(!store.clear("library").await.unwrap());
        assert!(store.get("library").await.unwrap().is_none());
    }
}
