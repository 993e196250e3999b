use super::entity::{ProgressRecord, MAX_SCORE};
use crate::domain::{DomainError, DomainResult};

/// Validates all ProgressRecord invariants
pub fn validate_progress_record(record: &ProgressRecord) -> DomainResult<()> {
    if record.partition.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "Progress record partition cannot be empty".to_string(),
        ));
    }

    if record.external_id.value() <= 0 {
        return Err(DomainError::InvariantViolation(format!(
            "External id must be positive, got {}",
            record.external_id
        )));
    }

    if record.score > MAX_SCORE {
        return Err(DomainError::InvariantViolation(format!(
            "Score {} exceeds maximum {}",
            record.score, MAX_SCORE
        )));
    }

    Ok(())
}
