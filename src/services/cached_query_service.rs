// src/services/cached_query_service.rs
//
// Cached-or-network catalog queries.
//
// A query result is pinned under a name, stored in the cache partition
// `pin:<name>`. While the pin is fresh and non-empty it is served locally;
// otherwise the query goes to the remote catalog and a non-empty answer
// replaces the pinned contents.
//
// The pin is marked fresh only after its new contents are written.

use std::sync::Arc;

use super::staleness_policy::StalenessPolicy;
use crate::domain::CatalogEntity;
use crate::error::AppResult;
use crate::events::{EventBus, PinnedQueryRefreshed};
use crate::integrations::{CatalogQuery, RemoteCatalogGateway};
use crate::repositories::LocalCacheGateway;

/// Keeps pin partitions apart from library partitions
pub const PIN_PARTITION_PREFIX: &str = "pin:";

/// Cache and sync-state partition backing the pin `pin`
pub fn pin_partition(pin: &str) -> String {
    format!("{}{}", PIN_PARTITION_PREFIX, pin)
}

pub struct CachedQueryService {
    local_cache: Arc<dyn LocalCacheGateway>,
    remote_catalog: Arc<dyn RemoteCatalogGateway>,
    staleness: Arc<StalenessPolicy>,
    event_bus: Arc<EventBus>,
}

impl CachedQueryService {
    pub fn new(
        local_cache: Arc<dyn LocalCacheGateway>,
        remote_catalog: Arc<dyn RemoteCatalogGateway>,
        staleness: Arc<StalenessPolicy>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            local_cache,
            remote_catalog,
            staleness,
            event_bus,
        }
    }

    /// Pinned results of `pin` if fresh, else the network answer.
    ///
    /// An empty network answer never wipes a pin: the previous contents are
    /// returned and the pin stays stale, so the next call asks again.
    pub async fn find_cached_or_network(
        &self,
        pin: &str,
        query: &CatalogQuery,
        expiration_days: u32,
    ) -> AppResult<Vec<CatalogEntity>> {
        let partition = pin_partition(pin);
        let pinned = self.local_cache.find_pinned(&partition).await?;
        let expired = self.staleness.is_stale(&partition, expiration_days).await?;

        if !pinned.is_empty() && !expired {
            log::debug!("Serving {} pinned entities for '{}'", pinned.len(), pin);
            return Ok(pinned);
        }

        let fetched = self.remote_catalog.query(query).await?;
        if fetched.is_empty() {
            log::warn!(
                "Network returned nothing for '{}', keeping {} pinned entities",
                pin,
                pinned.len()
            );
            return Ok(pinned);
        }

        self.local_cache.unpin_all(&partition).await?;
        self.local_cache.pin_all(&partition, &fetched).await?;
        let evicted = self.local_cache.evict_unpinned(&partition).await?;
        self.staleness.mark_fresh(&partition).await?;

        log::info!(
            "Pinned {} entities from the network under '{}'",
            fetched.len(),
            pin
        );
        self.event_bus.emit(PinnedQueryRefreshed::new(
            pin.to_string(),
            fetched.len(),
            evicted,
        ));

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_pool;
    use crate::domain::ExternalId;
    use crate::error::AppError;
    use crate::infrastructure::FixedClock;
    use crate::integrations::MockRemoteCatalogGateway;
    use crate::repositories::{SqliteCatalogCache, SqliteSyncStateStore};
    use chrono::{Duration, TimeZone, Utc};

    const PIN: &str = "Spring 2024";

    fn entity(id: i64, title: &str) -> CatalogEntity {
        CatalogEntity::new(ExternalId(id), title)
    }

    struct Setup {
        _dir: tempfile::TempDir,
        cache: Arc<SqliteCatalogCache>,
        clock: Arc<FixedClock>,
        staleness: Arc<StalenessPolicy>,
        service: CachedQueryService,
    }

    fn setup(remote: MockRemoteCatalogGateway) -> Setup {
        let (dir, pool) = create_test_pool().unwrap();
        let cache = Arc::new(SqliteCatalogCache::new(pool.clone()));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
        ));
        let staleness = Arc::new(StalenessPolicy::new(
            Arc::new(SqliteSyncStateStore::new(pool)),
            clock.clone(),
        ));
        let service = CachedQueryService::new(
            cache.clone(),
            Arc::new(remote),
            staleness.clone(),
            Arc::new(EventBus::new()),
        );
        Setup {
            _dir: dir,
            cache,
            clock,
            staleness,
            service,
        }
    }

    #[tokio::test]
    async fn test_first_call_goes_to_network_and_pins() {
        let mut remote = MockRemoteCatalogGateway::new();
        remote
            .expect_query()
            .times(1)
            .returning(|_| Ok(vec![entity(1, "A"), entity(2, "B")]));
        let s = setup(remote);

        let query = CatalogQuery::season(PIN);
        let first = s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();
        let second = s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(s.cache.find_pinned(&pin_partition(PIN)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_pin_is_replaced() {
        let mut remote = MockRemoteCatalogGateway::new();
        let mut calls = 0;
        remote.expect_query().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(vec![entity(1, "Old"), entity(2, "Dropped from season")])
            } else {
                Ok(vec![entity(1, "New")])
            }
        });
        let s = setup(remote);
        let query = CatalogQuery::season(PIN);

        s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();
        s.clock.advance(Duration::days(1));
        let refreshed = s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();

        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].title, "New");
        let pinned = s.cache.find_pinned(&pin_partition(PIN)).await.unwrap();
        assert_eq!(pinned, refreshed);
    }

    #[tokio::test]
    async fn test_empty_network_answer_keeps_old_pin() {
        let mut remote = MockRemoteCatalogGateway::new();
        let mut calls = 0;
        remote.expect_query().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(vec![entity(1, "Kept")])
            } else {
                Ok(vec![])
            }
        });
        let s = setup(remote);
        let query = CatalogQuery::season(PIN);

        s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();
        s.clock.advance(Duration::days(2));
        let result = s.service.find_cached_or_network(PIN, &query, 1).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "Kept");
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let mut remote = MockRemoteCatalogGateway::new();
        remote
            .expect_query()
            .returning(|_| Err(AppError::Network("timeout".to_string())));
        let s = setup(remote);

        let result = s
            .service
            .find_cached_or_network(PIN, &CatalogQuery::season(PIN), 1)
            .await;

        assert!(matches!(result, Err(AppError::Network(_))));
    }

    #[tokio::test]
    async fn test_failed_pin_write_leaves_pin_stale() {
        let mut remote = MockRemoteCatalogGateway::new();
        remote
            .expect_query()
            .times(2)
            .returning(|_| Ok(vec![entity(1, "Valid"), entity(2, " ")]));
        let s = setup(remote);
        let query = CatalogQuery::season(PIN);

        let first = s.service.find_cached_or_network(PIN, &query, 1).await;

        assert!(matches!(first, Err(AppError::Validation(_))));
        assert!(s.staleness.is_stale(&pin_partition(PIN), 1).await.unwrap());
        assert!(s.cache.find_pinned(&pin_partition(PIN)).await.unwrap().is_empty());

        // Nothing was marked fresh, so the next call asks the network again.
        let second = s.service.find_cached_or_network(PIN, &query, 1).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_pin_named_like_library_leaves_library_alone() {
        let library = crate::config::DEFAULT_LIBRARY_PARTITION;
        let mut remote = MockRemoteCatalogGateway::new();
        remote
            .expect_query()
            .times(1)
            .returning(|_| Ok(vec![entity(5, "Seasonal")]));
        let s = setup(remote);
        s.cache
            .upsert_all(library, &[entity(1, "In my library")])
            .await
            .unwrap();

        let pinned = s
            .service
            .find_cached_or_network(library, &CatalogQuery::season(PIN), 1)
            .await
            .unwrap();

        assert_eq!(pinned.len(), 1);
        let ids: std::collections::HashSet<ExternalId> = [ExternalId(1)].into_iter().collect();
        let kept = s.cache.find_by_ids(library, &ids).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "In my library");
        assert!(s.staleness.is_stale(library, 1).await.unwrap());
        assert!(!s.staleness.is_stale(&pin_partition(library), 1).await.unwrap());
    }
}
