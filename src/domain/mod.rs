// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// This file MUST declare all domain modules and re-export their public API.
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod catalog;
pub mod library;
pub mod merged;
pub mod progress;
pub mod sync_state;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Catalog Domain
pub use catalog::{validate_catalog_entity, AiringStatus, AnimeType, CatalogEntity, ExternalId};

// Progress Domain
pub use progress::{
    validate_progress_record, ExternalListEntry, ProgressRecord, WatchStatus, MAX_SCORE,
};

// Merged View
pub use merged::{dedup_ids, merge_catalog, MergedEntity};

// Library Views
pub use library::{filter_by_title, group_by_status, sort_library, LibraryStatusCounts, SortType};

// Sync State
pub use sync_state::SyncState;

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
