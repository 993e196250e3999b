pub mod entity;
pub mod invariants;

pub use entity::{ExternalListEntry, ProgressRecord, WatchStatus, MAX_SCORE};
pub use invariants::validate_progress_record;
