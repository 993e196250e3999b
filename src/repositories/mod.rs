// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Repositories are DUMB data mappers
// - NO reconciliation logic
// - NO event emission
// - NO cross-repository calls
// - Explicit SQL only
// - Every write batch is one transaction

pub mod catalog_cache_repository;
pub mod progress_repository;
pub mod sync_state_repository;

pub use catalog_cache_repository::{LocalCacheGateway, SqliteCatalogCache};
pub use progress_repository::{ProgressStore, SqliteProgressStore};
pub use sync_state_repository::{SqliteSyncStateStore, SyncStateStore};

#[cfg(test)]
pub use catalog_cache_repository::MockLocalCacheGateway;
#[cfg(test)]
pub use progress_repository::MockProgressStore;
#[cfg(test)]
pub use sync_state_repository::MockSyncStateStore;
