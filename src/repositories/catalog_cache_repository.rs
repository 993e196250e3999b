// src/repositories/catalog_cache_repository.rs
//
// Local catalog cache, partitioned by name.
//
// Rows are keyed by (partition, external_id). A pinned row survives
// evict_unpinned until its partition is explicitly unpinned.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{run_blocking, ConnectionPool};
use crate::domain::catalog::{validate_catalog_entity, CatalogEntity, ExternalId};
use crate::error::{AppError, AppResult};

/// SQLite accepts far more, but smaller statements keep the plan cache warm
const MAX_IDS_PER_STATEMENT: usize = 500;

const SELECT_COLUMNS: &str = "external_id, title, english_title, anime_type, airing_status,
     episodes, score_rank, popularity_rank, poster_url, start_date, next_episode_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalCacheGateway: Send + Sync {
    /// Entities of `partition` whose id is in `ids`; empty when none match.
    async fn find_by_ids(
        &self,
        partition: &str,
        ids: &HashSet<ExternalId>,
    ) -> AppResult<Vec<CatalogEntity>>;

    /// Insert-or-replace by external id, all entities in one transaction.
    async fn upsert_all(&self, partition: &str, entities: &[CatalogEntity]) -> AppResult<()>;

    /// Pinned entities of `partition`, ordered by external id.
    async fn find_pinned(&self, partition: &str) -> AppResult<Vec<CatalogEntity>>;

    /// Upsert and pin, in one transaction.
    async fn pin_all(&self, partition: &str, entities: &[CatalogEntity]) -> AppResult<()>;

    /// Release every pin of `partition`. Returns the number of rows unpinned.
    async fn unpin_all(&self, partition: &str) -> AppResult<usize>;

    /// Delete unpinned rows of `partition`. Returns the number of rows deleted.
    async fn evict_unpinned(&self, partition: &str) -> AppResult<usize>;
}

pub struct SqliteCatalogCache {
    pool: Arc<ConnectionPool>,
}

impl SqliteCatalogCache {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
    }

    /// Map database row to CatalogEntity
    fn row_to_entity(row: &Row) -> Result<CatalogEntity, rusqlite::Error> {
        let external_id: i64 = row.get("external_id")?;

        let anime_type_str: String = row.get("anime_type")?;
        let anime_type = anime_type_str
            .parse()
            .map_err(|e| Self::conversion_error(3, e))?;

        let airing_status_str: String = row.get("airing_status")?;
        let airing_status = airing_status_str
            .parse()
            .map_err(|e| Self::conversion_error(4, e))?;

        let start_date_str: Option<String> = row.get("start_date")?;
        let start_date = start_date_str
            .map(|s| s.parse::<NaiveDate>().map_err(|e| Self::conversion_error(9, e)))
            .transpose()?;

        let next_episode_str: Option<String> = row.get("next_episode_at")?;
        let next_episode_at = next_episode_str
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| Self::conversion_error(10, e))
            })
            .transpose()?;

        let episodes: Option<i64> = row.get("episodes")?;
        let rank: Option<i64> = row.get("score_rank")?;
        let popularity_rank: Option<i64> = row.get("popularity_rank")?;

        Ok(CatalogEntity {
            external_id: ExternalId(external_id),
            title: row.get("title")?,
            english_title: row.get("english_title")?,
            anime_type,
            airing_status,
            episodes: episodes.map(|v| v as u32),
            rank: rank.map(|v| v as u32),
            popularity_rank: popularity_rank.map(|v| v as u32),
            poster_url: row.get("poster_url")?,
            start_date,
            next_episode_at,
        })
    }

    fn find_by_ids_blocking(
        conn: &Connection,
        partition: &str,
        ids: &[i64],
    ) -> AppResult<Vec<CatalogEntity>> {
        let mut found = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM catalog_cache
                 WHERE partition = ? AND external_id IN ({})
                 ORDER BY external_id",
                SELECT_COLUMNS, placeholders
            );

            let bound = std::iter::once(Value::from(partition.to_string()))
                .chain(chunk.iter().map(|id| Value::from(*id)));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(bound), Self::row_to_entity)?
                .collect::<Result<Vec<_>, _>>()?;
            found.extend(rows);
        }

        Ok(found)
    }

    /// Upsert inside an open transaction. An existing pin is never cleared here.
    fn upsert_in_tx(
        tx: &Transaction,
        partition: &str,
        entities: &[CatalogEntity],
        pinned: bool,
        cached_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO catalog_cache (
                partition, external_id, title, english_title, anime_type, airing_status,
                episodes, score_rank, popularity_rank, poster_url, start_date,
                next_episode_at, pinned, cached_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(partition, external_id) DO UPDATE SET
                title = excluded.title,
                english_title = excluded.english_title,
                anime_type = excluded.anime_type,
                airing_status = excluded.airing_status,
                episodes = excluded.episodes,
                score_rank = excluded.score_rank,
                popularity_rank = excluded.popularity_rank,
                poster_url = excluded.poster_url,
                start_date = excluded.start_date,
                next_episode_at = excluded.next_episode_at,
                pinned = MAX(catalog_cache.pinned, excluded.pinned),
                cached_at = excluded.cached_at",
        )?;

        for entity in entities {
            validate_catalog_entity(entity).map_err(|e| AppError::Validation(e.to_string()))?;

            stmt.execute(params![
                partition,
                entity.external_id.value(),
                entity.title,
                entity.english_title,
                entity.anime_type.to_string(),
                entity.airing_status.to_string(),
                entity.episodes.map(|v| v as i64),
                entity.rank.map(|v| v as i64),
                entity.popularity_rank.map(|v| v as i64),
                entity.poster_url,
                entity.start_date.map(|d| d.to_string()),
                entity.next_episode_at.map(|dt| dt.to_rfc3339()),
                pinned as i64,
                cached_at.to_rfc3339(),
            ])?;
        }

        Ok(())
    }

    async fn write_batch(
        &self,
        partition: &str,
        entities: &[CatalogEntity],
        pinned: bool,
    ) -> AppResult<()> {
        let partition = partition.to_string();
        let entities = entities.to_vec();

        run_blocking(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            Self::upsert_in_tx(&tx, &partition, &entities, pinned, Utc::now())?;
            tx.commit()?;

            log::debug!(
                "Cached {} entities in partition '{}' (pinned: {})",
                entities.len(),
                partition,
                pinned
            );
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocalCacheGateway for SqliteCatalogCache {
    async fn find_by_ids(
        &self,
        partition: &str,
        ids: &HashSet<ExternalId>,
    ) -> AppResult<Vec<CatalogEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let partition = partition.to_string();
        let mut raw_ids: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        raw_ids.sort_unstable();

        run_blocking(&self.pool, move |conn| {
            Self::find_by_ids_blocking(conn, &partition, &raw_ids)
        })
        .await
    }

    async fn upsert_all(&self, partition: &str, entities: &[CatalogEntity]) -> AppResult<()> {
        self.write_batch(partition, entities, false).await
    }

    async fn find_pinned(&self, partition: &str) -> AppResult<Vec<CatalogEntity>> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let sql = format!(
                "SELECT {} FROM catalog_cache
                 WHERE partition = ?1 AND pinned = 1
                 ORDER BY external_id",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let entities = stmt
                .query_map(params![partition], Self::row_to_entity)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entities)
        })
        .await
    }

    async fn pin_all(&self, partition: &str, entities: &[CatalogEntity]) -> AppResult<()> {
        self.write_batch(partition, entities, true).await
    }

    async fn unpin_all(&self, partition: &str) -> AppResult<usize> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let unpinned = conn.execute(
                "UPDATE catalog_cache SET pinned = 0 WHERE partition = ?1 AND pinned = 1",
                params![partition],
            )?;
            Ok(unpinned)
        })
        .await
    }

    async fn evict_unpinned(&self, partition: &str) -> AppResult<usize> {
        let partition = partition.to_string();

        run_blocking(&self.pool, move |conn| {
            let evicted = conn.execute(
                "DELETE FROM catalog_cache WHERE partition = ?1 AND pinned = 0",
                params![partition],
            )?;
            if evicted > 0 {
                log::debug!("Evicted {} unpinned entities from '{}'", evicted, partition);
            }
            Ok(evicted)
        })
        .await
    }
}
