// src/lib.rs
// AnimeNow Sync - Local-first anime library sync
//
// Architecture:
// - Domain-centric: catalog, progress and merge rules live in domains
// - Three tiers: local cache, remote catalog, user progress
// - Event-driven: sync lifecycle is published on the event bus
// - Explicit: staleness decides when the network is consulted, nothing else

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod repositories;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod application;
pub mod integrations;

// ============================================================================
// PUBLIC API - Domain
// ============================================================================

pub use domain::{
    // Catalog
    AiringStatus,
    AnimeType,
    CatalogEntity,
    ExternalId,
    // Progress
    ExternalListEntry,
    ProgressRecord,
    WatchStatus,
    // Merged view
    MergedEntity,
    // Library views
    LibraryStatusCounts,
    SortType,
};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    create_event_bus,
    CatalogEntitiesCached,
    DomainEvent,
    EventBus,
    EventLogEntry,
    LibrarySyncCompleted,
    LibrarySyncFailed,
    LibrarySyncStarted,
    PinnedQueryRefreshed,
};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{create_connection_pool, initialize_database, ConnectionPool};

// ============================================================================
// PUBLIC API - Gateways and Stores
// ============================================================================

pub use repositories::{
    LocalCacheGateway,
    ProgressStore,
    SqliteCatalogCache,
    SqliteProgressStore,
    SqliteSyncStateStore,
    SyncStateStore,
};

pub use integrations::{
    CatalogApiClient,
    CatalogQuery,
    ExternalListProvider,
    MyAnimeListClient,
    RemoteCatalogGateway,
};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    pin_partition,
    CachedQueryService,
    ReconcileOptions,
    StalenessPolicy,
    SyncError,
    SyncPhase,
    SyncReconciler,
    SyncReport,
    SyncResult,
    SyncStats,
    PIN_PARTITION_PREFIX,
};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::AppState;
pub use config::SyncConfig;
