// src/repositories/progress_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::sync::Arc;

use crate::db::{run_blocking, ConnectionPool};
use crate::domain::catalog::ExternalId;
use crate::domain::progress::{validate_progress_record, ProgressRecord};
use crate::error::{AppError, AppResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Every record of `partition`, in insertion order.
    async fn all_progress(&self, partition: &str) -> AppResult<Vec<ProgressRecord>>;

    async fn find_by_id(
        &self,
        partition: &str,
        external_id: ExternalId,
    ) -> AppResult<Option<ProgressRecord>>;

    /// Replace the record sharing (partition, external_id), or insert it.
    async fn upsert(&self, record: &ProgressRecord) -> AppResult<()>;

    /// Upsert every record of `partition` in one transaction. Records
    /// absent from `records` are left untouched.
    async fn upsert_all(&self, partition: &str, records: &[ProgressRecord]) -> AppResult<()>;
}

pub struct SqliteProgressStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteProgressStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &Row) -> Result<ProgressRecord, rusqlite::Error> {
        let status_str: String = row.get("status")?;
        let status = status_str.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?;

        let updated_at_str: String = row.get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        let episodes_watched: i64 = row.get("episodes_watched")?;
        let score: i64 = row.get("score")?;

        Ok(ProgressRecord {
            partition: row.get("partition")?,
            external_id: ExternalId(row.get("external_id")?),
            status,
            episodes_watched: episodes_watched as u32,
            score: score as u8,
            updated_at,
        })
    }

    fn upsert_in_tx(tx: &Transaction, record: &ProgressRecord) -> AppResult<()> {
        validate_progress_record(record).map_err(|e| AppError::Validation(e.to_string()))?;

        tx.prepare_cached(
            "INSERT INTO progress_records (
                partition, external_id, status, episodes_watched, score, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(partition, external_id) DO UPDATE SET
                status = excluded.status,
                episodes_watched = excluded.episodes_watched,
                score = excluded.score,
                updated_at = excluded.updated_at",
        )?
        .execute(params![
            record.partition,
            record.external_id.value(),
            record.status.as_str(),
            record.episodes_watched as i64,
            record.score as i64,
            record.updated_at.to_rfc3339(),
        ])?;

        Ok(())
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn all_progress(&self, partition: &str) -> AppResult<Vec<ProgressRecord>> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT partition, external_id, status, episodes_watched, score, updated_at
                 FROM progress_records
                 WHERE partition = ?1
                 ORDER BY rowid",
            )?;
            let records = stmt
                .query_map(params![partition], Self::row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn find_by_id(
        &self,
        partition: &str,
        external_id: ExternalId,
    ) -> AppResult<Option<ProgressRecord>> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let record = conn
                .query_row(
                    "SELECT partition, external_id, status, episodes_watched, score, updated_at
                     FROM progress_records
                     WHERE partition = ?1 AND external_id = ?2",
                    params![partition, external_id.value()],
                    Self::row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn upsert(&self, record: &ProgressRecord) -> AppResult<()> {
        let record = record.clone();

        run_blocking(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            Self::upsert_in_tx(&tx, &record)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_all(&self, partition: &str, records: &[ProgressRecord]) -> AppResult<()> {
        if let Some(foreign) = records.iter().find(|r| r.partition != partition) {
            return Err(AppError::Validation(format!(
                "Progress record for {} belongs to partition '{}', not '{}'",
                foreign.external_id, foreign.partition, partition
            )));
        }
        if records.is_empty() {
            return Ok(());
        }

        let partition = partition.to_string();
        let records = records.to_vec();

        run_blocking(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            for record in &records {
                Self::upsert_in_tx(&tx, record)?;
            }
            tx.commit()?;

            log::debug!("Upserted {} progress records in '{}'", records.len(), partition);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_pool;
    use crate::domain::progress::WatchStatus;

    fn record(id: i64, status: WatchStatus, episodes: u32) -> ProgressRecord {
        ProgressRecord::new("library", ExternalId(id), status, episodes, 0)
    }

    #[tokio::test]
    async fn test_upsert_replaces_without_duplicating() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        store.upsert(&record(5, WatchStatus::Watching, 3)).await.unwrap();
        store.upsert(&record(5, WatchStatus::Completed, 12)).await.unwrap();

        let all = store.all_progress("library").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, WatchStatus::Completed);
        assert_eq!(all[0].episodes_watched, 12);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        let stored = record(2, WatchStatus::OnHold, 7);
        store.upsert(&stored).await.unwrap();

        let found = store.find_by_id("library", ExternalId(2)).await.unwrap();
        assert_eq!(found.map(|r| r.status), Some(WatchStatus::OnHold));
        assert!(store.find_by_id("library", ExternalId(3)).await.unwrap().is_none());
        assert!(store.find_by_id("other", ExternalId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_score_is_rejected() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        let mut bad = record(1, WatchStatus::Completed, 1);
        bad.score = 11;

        assert!(matches!(store.upsert(&bad).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_upsert_all_keeps_records_missing_from_the_batch() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        store.upsert(&record(1, WatchStatus::Watching, 1)).await.unwrap();
        store.upsert(&record(9, WatchStatus::Dropped, 2)).await.unwrap();

        let imported = vec![
            record(3, WatchStatus::Planning, 0),
            record(1, WatchStatus::Completed, 24),
        ];
        store.upsert_all("library", &imported).await.unwrap();

        let stored: Vec<(i64, WatchStatus)> = store
            .all_progress("library")
            .await
            .unwrap()
            .iter()
            .map(|r| (r.external_id.value(), r.status))
            .collect();
        assert_eq!(
            stored,
            vec![
                (1, WatchStatus::Completed),
                (9, WatchStatus::Dropped),
                (3, WatchStatus::Planning),
            ]
        );
    }

    #[tokio::test]
    async fn test_upsert_all_rolls_back_on_invalid_record() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        store.upsert(&record(1, WatchStatus::Watching, 1)).await.unwrap();

        let mut bad = record(2, WatchStatus::Completed, 1);
        bad.score = 42;
        let result = store
            .upsert_all("library", &[record(3, WatchStatus::Planning, 0), bad])
            .await;

        assert!(result.is_err());
        let all = store.all_progress("library").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].external_id, ExternalId(1));
    }

    #[tokio::test]
    async fn test_upsert_all_rejects_foreign_records() {
        let (_dir, pool) = create_test_pool().unwrap();
        let store = SqliteProgressStore::new(pool);

        let foreign = ProgressRecord::new("other", ExternalId(1), WatchStatus::Watching, 0, 0);
        let result = store.upsert_all("library", &[foreign]).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
