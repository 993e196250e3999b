// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod cached_query_service;
pub mod staleness_policy;
pub mod sync_reconciler;
pub mod sync_types;


pub use cached_query_service::{pin_partition, CachedQueryService, PIN_PARTITION_PREFIX};

pub use staleness_policy::StalenessPolicy;

pub use sync_reconciler::SyncReconciler;

pub use sync_types::{
    ReconcileOptions,
    SyncError,
    SyncPhase,
    SyncReport,
    SyncResult,
    SyncStats,
    DEFAULT_MAX_BATCH,
};
