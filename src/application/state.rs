// src/application/state.rs

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::db::{
    create_connection_pool, get_connection, get_database_stats, initialize_database,
    verify_database_integrity, ConnectionPool, DatabaseStats,
};
use crate::error::AppResult;
use crate::events::EventBus;
use crate::infrastructure::{Clock, SystemClock};
use crate::integrations::{
    CatalogApiClient, ExternalListProvider, MyAnimeListClient, RemoteCatalogGateway,
};
use crate::repositories::{
    LocalCacheGateway, ProgressStore, SqliteCatalogCache, SqliteProgressStore,
    SqliteSyncStateStore, SyncStateStore,
};
use crate::services::{CachedQueryService, StalenessPolicy, SyncReconciler};

/// Everything a host needs to run syncs.
/// All fields are Arc-wrapped for sharing across tasks.
pub struct AppState {
    pub config: SyncConfig,
    pub pool: Arc<ConnectionPool>,
    pub event_bus: Arc<EventBus>,
    pub progress_store: Arc<dyn ProgressStore>,
    pub staleness: Arc<StalenessPolicy>,
    pub reconciler: Arc<SyncReconciler>,
    pub cached_queries: Arc<CachedQueryService>,
}

impl AppState {
    /// Open the database and wire the production gateways.
    pub fn from_config(config: SyncConfig) -> AppResult<Self> {
        config.validate()?;

        let catalog: Arc<dyn RemoteCatalogGateway> = Arc::new(CatalogApiClient::new(
            &config.catalog.base_url,
            config.catalog.application_id.clone(),
            config.catalog.rest_api_key.clone(),
            config.http_timeout(),
        )?);
        let list_provider: Arc<dyn ExternalListProvider> = Arc::new(MyAnimeListClient::new(
            &config.list_provider.base_url,
            config.list_provider.username.clone(),
            config.http_timeout(),
        )?);

        Self::with_gateways(config, catalog, list_provider, Arc::new(SystemClock))
    }

    /// Wire the state around caller-supplied remote gateways and clock.
    pub fn with_gateways(
        config: SyncConfig,
        catalog: Arc<dyn RemoteCatalogGateway>,
        list_provider: Arc<dyn ExternalListProvider>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        // 1. INFRASTRUCTURE
        let pool = Arc::new(create_connection_pool(&config.database_path, config.pool_size)?);
        {
            let conn = get_connection(&pool)?;
            initialize_database(&conn)?;
        }
        let event_bus = Arc::new(EventBus::new());

        // 2. REPOSITORIES
        let local_cache: Arc<dyn LocalCacheGateway> =
            Arc::new(SqliteCatalogCache::new(pool.clone()));
        let progress_store: Arc<dyn ProgressStore> =
            Arc::new(SqliteProgressStore::new(pool.clone()));
        let sync_state: Arc<dyn SyncStateStore> =
            Arc::new(SqliteSyncStateStore::new(pool.clone()));

        // 3. SERVICES
        let staleness = Arc::new(StalenessPolicy::new(sync_state, clock.clone()));
        let reconciler = Arc::new(SyncReconciler::new(
            staleness.clone(),
            local_cache.clone(),
            catalog.clone(),
            progress_store.clone(),
            list_provider,
            clock,
            event_bus.clone(),
            config.reconcile_options(),
        ));
        let cached_queries = Arc::new(CachedQueryService::new(
            local_cache,
            catalog,
            staleness.clone(),
            event_bus.clone(),
        ));

        log::info!("Sync state ready at {}", config.database_path.display());

        Ok(Self {
            config,
            pool,
            event_bus,
            progress_store,
            staleness,
            reconciler,
            cached_queries,
        })
    }

    /// Run SQLite's integrity check on the sync database.
    pub fn verify_integrity(&self) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        verify_database_integrity(&conn)
    }

    pub fn database_stats(&self) -> AppResult<DatabaseStats> {
        let conn = get_connection(&self.pool)?;
        get_database_stats(&conn)
    }
}
