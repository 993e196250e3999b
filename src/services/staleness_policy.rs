// src/services/staleness_policy.rs
//
// Staleness Policy
//
// Decides per partition whether cached data must be refreshed.
//
// CRITICAL RULES:
// - Whole calendar days (UTC), never fractional hours
// - No timestamp means stale
// - A timestamp in the future means stale (clock moved backwards)
// - Storage failures propagate; they never read as "fresh"

use std::sync::Arc;

use crate::domain::SyncState;
use crate::error::AppResult;
use crate::infrastructure::Clock;
use crate::repositories::SyncStateStore;

pub struct StalenessPolicy {
    store: Arc<dyn SyncStateStore>,
    clock: Arc<dyn Clock>,
}

impl StalenessPolicy {
    pub fn new(store: Arc<dyn SyncStateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn is_stale(&self, partition: &str, max_age_days: u32) -> AppResult<bool> {
        let Some(state) = self.store.get(partition).await? else {
            log::debug!("Partition '{}' has never been synced", partition);
            return Ok(true);
        };

        let age = state.age_in_days(self.clock.now());
        if age < 0 {
            log::warn!(
                "Partition '{}' was synced in the future ({}), treating as stale",
                partition,
                state.last_synced_at
            );
            return Ok(true);
        }

        Ok(age >= i64::from(max_age_days))
    }

    /// Record `now` as the partition's last successful sync.
    pub async fn mark_fresh(&self, partition: &str) -> AppResult<()> {
        let state = SyncState::new(partition, self.clock.now());
        self.store.put(&state).await?;
        log::debug!("Partition '{}' marked fresh at {}", partition, state.last_synced_at);
        Ok(())
    }

    /// Forget the partition's timestamp; the next check reports stale.
    pub async fn invalidate(&self, partition: &str) -> AppResult<()> {
        if self.store.clear(partition).await? {
            log::info!("Partition '{}' invalidated", partition);
        }
        Ok(())
    }

    pub async fn last_synced(&self, partition: &str) -> AppResult<Option<SyncState>> {
        self.store.get(partition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_test_pool;
    use crate::error::AppError;
    use crate::infrastructure::FixedClock;
    use crate::repositories::{MockSyncStateStore, SqliteSyncStateStore};
    use chrono::{Duration, TimeZone, Utc};

    fn policy_at(
        now: chrono::DateTime<Utc>,
    ) -> (tempfile::TempDir, Arc<FixedClock>, StalenessPolicy) {
        let (dir, pool) = create_test_pool().unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let policy = StalenessPolicy::new(Arc::new(SqliteSyncStateStore::new(pool)), clock.clone());
        (dir, clock, policy)
    }

    #[tokio::test]
    async fn test_never_synced_is_stale() {
        let (_dir, _clock, policy) = policy_at(Utc::now());
        assert!(policy.is_stale("anime", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_day_is_fresh_next_day_is_stale() {
        let (_dir, clock, policy) = policy_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 10, 0).unwrap());

        policy.mark_fresh("library").await.unwrap();

        clock.set(Utc.with_ymd_and_hms(2024, 6, 1, 23, 50, 0).unwrap());
        assert!(!policy.is_stale("library", 1).await.unwrap());

        clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 1).unwrap());
        assert!(policy.is_stale("library", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_max_age_is_inclusive() {
        let (_dir, clock, policy) = policy_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());

        policy.mark_fresh("library").await.unwrap();
        clock.advance(Duration::days(2));

        assert!(!policy.is_stale("library", 3).await.unwrap());
        assert!(policy.is_stale("library", 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_max_age_is_always_stale() {
        let (_dir, _clock, policy) = policy_at(Utc::now());

        policy.mark_fresh("library").await.unwrap();
        assert!(policy.is_stale("library", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_future_timestamp_is_stale() {
        let (_dir, clock, policy) = policy_at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

        policy.mark_fresh("library").await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        assert!(policy.is_stale("library", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let (_dir, _clock, policy) = policy_at(Utc::now());

        policy.mark_fresh("library").await.unwrap();

        assert!(!policy.is_stale("library", 1).await.unwrap());
        assert!(policy.is_stale("Spring 2024", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (_dir, _clock, policy) = policy_at(Utc::now());

        policy.mark_fresh("library").await.unwrap();
        policy.invalidate("library").await.unwrap();

        assert!(policy.is_stale("library", 30).await.unwrap());
        assert!(policy.last_synced("library").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut store = MockSyncStateStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::Pool("pool exhausted".to_string())));

        let policy = StalenessPolicy::new(Arc::new(store), Arc::new(FixedClock::new(Utc::now())));

        assert!(matches!(
            policy.is_stale("library", 1).await,
            Err(AppError::Pool(_))
        ));
    }
}
