// src/services/sync_reconciler.rs
//
// Sync Reconciler
//
// Produces the user's library: catalog entities for every id on the user's
// list, progress attached, missing entities backfilled from the remote
// catalog and cached locally.
//
// CRITICAL RULES:
// - At most one reconciliation in flight per partition
// - Remote fetches only for ids absent from the local cache
// - Nothing is written before PersistingRemote; from there on the writes
//   finish even if the caller goes away
// - mark_fresh only after every earlier step succeeded
// - Gateway errors propagate unmodified inside the step's SyncError
// - No retries, no fallback to stale data

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OwnedMutexGuard;

use super::staleness_policy::StalenessPolicy;
use super::sync_types::{ReconcileOptions, SyncError, SyncPhase, SyncReport, SyncResult, SyncStats};
use crate::domain::{dedup_ids, merge_catalog, CatalogEntity, ExternalId, MergedEntity, ProgressRecord};
use crate::error::AppError;
use crate::events::{
    CatalogEntitiesCached, EventBus, LibrarySyncCompleted, LibrarySyncFailed, LibrarySyncStarted,
};
use crate::infrastructure::Clock;
use crate::integrations::{ExternalListProvider, RemoteCatalogGateway};
use crate::repositories::{LocalCacheGateway, ProgressStore};

type PhaseMap = Arc<RwLock<HashMap<String, SyncPhase>>>;

// ============================================================================
// PHASE TRACKING
// ============================================================================

/// Publishes one run's phase transitions.
///
/// A run dropped before reaching a terminal phase is recorded as
/// `Failed("cancelled")`.
struct PhaseTracker {
    partition: String,
    phases: PhaseMap,
    current: SyncPhase,
}

impl PhaseTracker {
    fn new(partition: &str, phases: PhaseMap) -> Self {
        Self {
            partition: partition.to_string(),
            phases,
            current: SyncPhase::Idle,
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        log::debug!("[sync:{}] {} -> {}", self.partition, self.current, phase);
        self.current = phase.clone();
        self.phases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.partition.clone(), phase);
    }
}

impl Drop for PhaseTracker {
    fn drop(&mut self) {
        if self.current.is_terminal() {
            return;
        }

        if self.current.is_cancellable() {
            log::warn!(
                "[sync:{}] abandoned during {}, nothing was written",
                self.partition,
                self.current
            );
        } else {
            log::warn!(
                "[sync:{}] abandoned during {}, started writes still complete",
                self.partition,
                self.current
            );
        }
        self.enter(SyncPhase::Failed("cancelled".to_string()));
    }
}

/// Id list for a run, plus progress to import when it came from the list provider
struct IdSource {
    ids: Vec<ExternalId>,
    staged_progress: Option<Vec<ProgressRecord>>,
}

// ============================================================================
// SYNC RECONCILER
// ============================================================================

pub struct SyncReconciler {
    staleness: Arc<StalenessPolicy>,
    local_cache: Arc<dyn LocalCacheGateway>,
    remote_catalog: Arc<dyn RemoteCatalogGateway>,
    progress_store: Arc<dyn ProgressStore>,
    list_provider: Arc<dyn ExternalListProvider>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    options: ReconcileOptions,
    partition_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    phases: PhaseMap,
}

impl SyncReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        staleness: Arc<StalenessPolicy>,
        local_cache: Arc<dyn LocalCacheGateway>,
        remote_catalog: Arc<dyn RemoteCatalogGateway>,
        progress_store: Arc<dyn ProgressStore>,
        list_provider: Arc<dyn ExternalListProvider>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            staleness,
            local_cache,
            remote_catalog,
            progress_store,
            list_provider,
            clock,
            event_bus,
            options,
            partition_locks: Mutex::new(HashMap::new()),
            phases: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // ========================================================================
    // PUBLIC API
    // ========================================================================

    /// Reconcile `partition` and return the merged library.
    ///
    /// Entities follow the order of the user's list; ids unknown both locally
    /// and upstream are left out.
    pub async fn reconcile(
        &self,
        partition: &str,
        max_age_days: u32,
    ) -> SyncResult<Vec<MergedEntity>> {
        self.reconcile_with_report(partition, max_age_days)
            .await
            .map(|report| report.entities)
    }

    /// Like `reconcile`, with counters describing what the run did.
    pub async fn reconcile_with_report(
        &self,
        partition: &str,
        max_age_days: u32,
    ) -> SyncResult<SyncReport> {
        let guard = self.partition_lock(partition).lock_owned().await;

        let mut tracker = PhaseTracker::new(partition, Arc::clone(&self.phases));
        self.event_bus
            .emit(LibrarySyncStarted::new(partition.to_string()));
        log::info!("Reconciling partition '{}'", partition);

        match self.run(partition, max_age_days, &mut tracker, guard).await {
            Ok(report) => {
                tracker.enter(SyncPhase::Done);
                log::info!(
                    "Partition '{}' reconciled: {} entities, {} fetched remotely",
                    partition,
                    report.entities.len(),
                    report.stats.remote_fetched
                );
                self.event_bus.emit(LibrarySyncCompleted::new(
                    partition.to_string(),
                    report.entities.len(),
                    report.stats.remote_fetched,
                    report.stats.external_list_fetched,
                ));
                Ok(report)
            }
            Err(err) => {
                let phase = tracker.current.name().to_string();
                log::error!("Partition '{}' failed during {}: {}", partition, phase, err);
                tracker.enter(SyncPhase::Failed(err.to_string()));
                self.event_bus.emit(LibrarySyncFailed::new(
                    partition.to_string(),
                    phase,
                    err.to_string(),
                    err.is_retryable(),
                ));
                Err(err)
            }
        }
    }

    /// Current or last phase of `partition`; Idle if it never ran.
    pub fn current_phase(&self, partition: &str) -> SyncPhase {
        self.phases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(partition)
            .cloned()
            .unwrap_or(SyncPhase::Idle)
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    // ========================================================================
    // RECONCILIATION STEPS
    // ========================================================================

    async fn run(
        &self,
        partition: &str,
        max_age_days: u32,
        tracker: &mut PhaseTracker,
        guard: OwnedMutexGuard<()>,
    ) -> SyncResult<SyncReport> {
        let mut stats = SyncStats::default();

        // Step 1: Staleness
        tracker.enter(SyncPhase::CheckingStaleness);
        let stale = self
            .staleness
            .is_stale(partition, max_age_days)
            .await
            .map_err(SyncError::StalenessCheck)?;

        // Step 2: Id list
        let source = if stale {
            tracker.enter(SyncPhase::FetchingExternalList);
            stats.external_list_fetched = true;
            self.ids_from_external_list(partition).await?
        } else {
            self.ids_from_local_progress(partition).await?
        };
        let ids = source.ids;
        stats.requested_ids = ids.len();

        // Step 3: Local lookup
        tracker.enter(SyncPhase::QueryingLocal);
        let id_set: HashSet<ExternalId> = ids.iter().copied().collect();
        let present = self
            .local_cache
            .find_by_ids(partition, &id_set)
            .await
            .map_err(SyncError::LocalCache)?;

        let present_ids: HashSet<ExternalId> = present.iter().map(|e| e.external_id).collect();
        let missing: Vec<ExternalId> = ids
            .iter()
            .copied()
            .filter(|id| !present_ids.contains(id))
            .collect();
        stats.local_hits = ids.len() - missing.len();
        stats.remote_requested = missing.len();

        // Step 4: Remote backfill
        let fetched = if missing.is_empty() {
            Vec::new()
        } else {
            tracker.enter(SyncPhase::FetchingMissingRemote);
            self.fetch_missing(&missing, &mut stats).await?
        };

        // Step 5: Persist
        let (fetched, _guard) = if fetched.is_empty() && source.staged_progress.is_none() {
            (fetched, guard)
        } else {
            tracker.enter(SyncPhase::PersistingRemote);
            self.persist(partition, fetched, source.staged_progress, guard)
                .await?
        };

        // Step 6: Merge and attach progress
        tracker.enter(SyncPhase::AttachingProgress);
        let catalog = merge_catalog(&ids, present, fetched);
        let entities = self.attach_progress(partition, catalog).await?;

        let returned: HashSet<ExternalId> = entities.iter().map(|e| e.external_id()).collect();
        stats.unresolved = ids.iter().filter(|id| !returned.contains(id)).count();
        if stats.unresolved > 0 {
            log::info!(
                "{} ids of '{}' are unknown to the catalog",
                stats.unresolved,
                partition
            );
        }

        // Step 7: Mark fresh
        tracker.enter(SyncPhase::MarkingFresh);
        self.staleness
            .mark_fresh(partition)
            .await
            .map_err(SyncError::MarkFresh)?;

        Ok(SyncReport {
            partition: partition.to_string(),
            entities,
            stats,
        })
    }

    /// The list provider's ids, with progress staged in memory for import.
    async fn ids_from_external_list(&self, partition: &str) -> SyncResult<IdSource> {
        let entries = self
            .list_provider
            .fetch_list()
            .await
            .map_err(SyncError::ExternalList)?;

        let now = self.clock.now();
        let mut seen = HashSet::new();
        let records: Vec<ProgressRecord> = entries
            .iter()
            .filter(|entry| seen.insert(entry.external_id))
            .map(|entry| entry.to_progress_record(partition, now))
            .collect();

        if records.len() < entries.len() {
            log::debug!(
                "External list for '{}' had {} duplicate entries",
                partition,
                entries.len() - records.len()
            );
        }

        Ok(IdSource {
            ids: records.iter().map(|r| r.external_id).collect(),
            staged_progress: Some(records),
        })
    }

    /// Ids of the progress already stored for the partition.
    async fn ids_from_local_progress(&self, partition: &str) -> SyncResult<IdSource> {
        let records = self
            .progress_store
            .all_progress(partition)
            .await
            .map_err(SyncError::Progress)?;

        Ok(IdSource {
            ids: dedup_ids(records.iter().map(|r| r.external_id)),
            staged_progress: None,
        })
    }

    /// Fetch `missing` in chunks of at most `max_batch` ids.
    async fn fetch_missing(
        &self,
        missing: &[ExternalId],
        stats: &mut SyncStats,
    ) -> SyncResult<Vec<CatalogEntity>> {
        let max_batch = self.options.max_batch;
        if max_batch == 0 {
            return Err(SyncError::RemoteFetch(AppError::Validation(
                "max_batch must be positive".to_string(),
            )));
        }

        let mut fetched = Vec::with_capacity(missing.len());
        for chunk in missing.chunks(max_batch) {
            let batch: HashSet<ExternalId> = chunk.iter().copied().collect();
            let entities = self
                .remote_catalog
                .fetch_by_ids(&batch, max_batch)
                .await
                .map_err(SyncError::RemoteFetch)?;

            stats.remote_batches += 1;
            fetched.extend(entities);
        }

        stats.remote_fetched = fetched.len();
        log::debug!(
            "Fetched {} of {} missing entities in {} batches",
            fetched.len(),
            missing.len(),
            stats.remote_batches
        );
        Ok(fetched)
    }

    /// Write fetched entities and staged progress.
    ///
    /// Runs as its own task holding the partition lock, so it completes and
    /// releases the lock even if this future is dropped.
    async fn persist(
        &self,
        partition: &str,
        fetched: Vec<CatalogEntity>,
        staged_progress: Option<Vec<ProgressRecord>>,
        guard: OwnedMutexGuard<()>,
    ) -> SyncResult<(Vec<CatalogEntity>, OwnedMutexGuard<()>)> {
        let local_cache = Arc::clone(&self.local_cache);
        let progress_store = Arc::clone(&self.progress_store);
        let task_partition = partition.to_string();

        let handle = tokio::spawn(async move {
            if !fetched.is_empty() {
                local_cache.upsert_all(&task_partition, &fetched).await?;
            }
            if let Some(records) = staged_progress {
                progress_store
                    .upsert_all(&task_partition, &records)
                    .await?;
            }
            Ok::<_, AppError>((fetched, guard))
        });

        let (fetched, guard) = handle
            .await
            .map_err(|e| SyncError::Persist(AppError::Other(format!("Persist task failed: {}", e))))?
            .map_err(SyncError::Persist)?;

        if !fetched.is_empty() {
            self.event_bus.emit(CatalogEntitiesCached::new(
                partition.to_string(),
                fetched.iter().map(|e| e.external_id.value()).collect(),
            ));
        }

        Ok((fetched, guard))
    }

    async fn attach_progress(
        &self,
        partition: &str,
        catalog: Vec<CatalogEntity>,
    ) -> SyncResult<Vec<MergedEntity>> {
        let mut merged = Vec::with_capacity(catalog.len());
        for entity in catalog {
            let progress = self
                .progress_store
                .find_by_id(partition, entity.external_id)
                .await
                .map_err(SyncError::Progress)?;
            merged.push(MergedEntity::new(entity, progress));
        }
        Ok(merged)
    }

    /// Lock for `partition`. Locks nobody holds or waits on are dropped
    /// first, so the map only tracks partitions with runs in flight.
    fn partition_lock(&self, partition: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .partition_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(partition.to_string()).or_default())
    }

    #[cfg(test)]
    pub(crate) fn tracked_partition_locks(&self) -> usize {
        self.partition_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
