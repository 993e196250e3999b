// src/services/sync_types.rs
//
// Sync Types
//
// Phases, errors and reports of a library reconciliation.
//
// CRITICAL RULES:
// - Each SyncError variant names the step that failed and wraps the
//   gateway's AppError unmodified
// - No reconciliation logic in types

use serde::Serialize;
use thiserror::Error;

use crate::domain::MergedEntity;
use crate::error::AppError;

// ============================================================================
// SYNC PHASE
// ============================================================================

/// Where a partition's reconciliation currently is.
///
/// Idle → CheckingStaleness → FetchingExternalList → QueryingLocal →
/// FetchingMissingRemote → PersistingRemote → AttachingProgress →
/// MarkingFresh → Done, or Failed from any phase after Idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Idle,
    CheckingStaleness,
    FetchingExternalList,
    QueryingLocal,
    FetchingMissingRemote,
    PersistingRemote,
    AttachingProgress,
    MarkingFresh,
    Done,
    Failed(String),
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed(_))
    }

    /// Whether cancelling the caller is still side-effect free
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            SyncPhase::Idle
                | SyncPhase::CheckingStaleness
                | SyncPhase::FetchingExternalList
                | SyncPhase::QueryingLocal
                | SyncPhase::FetchingMissingRemote
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "Idle",
            SyncPhase::CheckingStaleness => "CheckingStaleness",
            SyncPhase::FetchingExternalList => "FetchingExternalList",
            SyncPhase::QueryingLocal => "QueryingLocal",
            SyncPhase::FetchingMissingRemote => "FetchingMissingRemote",
            SyncPhase::PersistingRemote => "PersistingRemote",
            SyncPhase::AttachingProgress => "AttachingProgress",
            SyncPhase::MarkingFresh => "MarkingFresh",
            SyncPhase::Done => "Done",
            SyncPhase::Failed(_) => "Failed",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Failed(reason) => write!(f, "Failed({})", reason),
            other => write!(f, "{}", other.name()),
        }
    }
}

// ============================================================================
// SYNC ERROR
// ============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Staleness check failed: {0}")]
    StalenessCheck(#[source] AppError),

    #[error("External list fetch failed: {0}")]
    ExternalList(#[source] AppError),

    #[error("Local cache read failed: {0}")]
    LocalCache(#[source] AppError),

    #[error("Remote catalog fetch failed: {0}")]
    RemoteFetch(#[source] AppError),

    #[error("Persisting sync results failed: {0}")]
    Persist(#[source] AppError),

    #[error("Progress lookup failed: {0}")]
    Progress(#[source] AppError),

    #[error("Marking partition fresh failed: {0}")]
    MarkFresh(#[source] AppError),
}

impl SyncError {
    /// The wrapped gateway error
    pub fn app_error(&self) -> &AppError {
        match self {
            SyncError::StalenessCheck(e)
            | SyncError::ExternalList(e)
            | SyncError::LocalCache(e)
            | SyncError::RemoteFetch(e)
            | SyncError::Persist(e)
            | SyncError::Progress(e)
            | SyncError::MarkFresh(e) => e,
        }
    }

    /// Whether retrying the whole reconciliation may succeed
    pub fn is_retryable(&self) -> bool {
        self.app_error().is_retryable()
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

// ============================================================================
// OPTIONS AND REPORT
// ============================================================================

/// Remote fetch batch limit used when none is configured
pub const DEFAULT_MAX_BATCH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Upper bound on ids per remote request
    pub max_batch: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

/// Counters of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// The partition was stale and the external list was downloaded
    pub external_list_fetched: bool,
    /// Distinct ids requested
    pub requested_ids: usize,
    pub local_hits: usize,
    /// Ids missing locally and asked from the remote
    pub remote_requested: usize,
    pub remote_fetched: usize,
    pub remote_batches: usize,
    /// Requested ids neither cached nor known upstream
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub partition: String,
    pub entities: Vec<MergedEntity>,
    pub stats: SyncStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_follows_wrapped_error() {
        let network = SyncError::RemoteFetch(AppError::Network("timeout".to_string()));
        assert!(network.is_retryable());

        let too_big = SyncError::RemoteFetch(AppError::Validation("batch".to_string()));
        assert!(!too_big.is_retryable());

        let disk = SyncError::Persist(AppError::Io(std::io::Error::other("disk full")));
        assert!(disk.is_retryable());
    }

    #[test]
    fn test_error_message_names_the_step() {
        let err = SyncError::ExternalList(AppError::Network("503".to_string()));
        assert!(err.to_string().starts_with("External list fetch failed"));
    }

    #[test]
    fn test_cancellation_window_closes_at_persist() {
        assert!(SyncPhase::FetchingMissingRemote.is_cancellable());
        assert!(!SyncPhase::PersistingRemote.is_cancellable());
        assert!(!SyncPhase::MarkingFresh.is_cancellable());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SyncPhase::QueryingLocal.to_string(), "QueryingLocal");
        assert_eq!(
            SyncPhase::Failed("cancelled".to_string()).to_string(),
            "Failed(cancelled)"
        );
        assert!(SyncPhase::Failed(String::new()).is_terminal());
    }
}
