use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::catalog::ExternalId;
use crate::domain::DomainError;

/// Highest score a user can give a title
pub const MAX_SCORE: u8 = 10;

/// The user's progress on one title.
///
/// Local-only and owned separately from catalog entities: at most one record
/// per (partition, external id), last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Library partition this record belongs to
    pub partition: String,

    pub external_id: ExternalId,

    pub status: WatchStatus,

    pub episodes_watched: u32,

    /// 0 means unscored
    pub score: u8,

    pub updated_at: DateTime<Utc>,
}

/// List status of a title in the user's library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Planning,
    Watching,
    Completed,
    OnHold,
    Dropped,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 5] = [
        WatchStatus::Planning,
        WatchStatus::Watching,
        WatchStatus::Completed,
        WatchStatus::OnHold,
        WatchStatus::Dropped,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Planning => "planning",
            WatchStatus::Watching => "watching",
            WatchStatus::Completed => "completed",
            WatchStatus::OnHold => "on_hold",
            WatchStatus::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepts both the storage form and the list-provider spellings
/// ("plan to watch", "on-hold").
impl FromStr for WatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "planning" | "plan_to_watch" | "plantowatch" => Ok(WatchStatus::Planning),
            "watching" => Ok(WatchStatus::Watching),
            "completed" => Ok(WatchStatus::Completed),
            "on_hold" | "onhold" => Ok(WatchStatus::OnHold),
            "dropped" => Ok(WatchStatus::Dropped),
            _ => Err(DomainError::InvariantViolation(format!(
                "Unknown watch status '{}'",
                s
            ))),
        }
    }
}

impl ProgressRecord {
    pub fn new(
        partition: impl Into<String>,
        external_id: ExternalId,
        status: WatchStatus,
        episodes_watched: u32,
        score: u8,
    ) -> Self {
        Self {
            partition: partition.into(),
            external_id,
            status,
            episodes_watched,
            score,
            updated_at: Utc::now(),
        }
    }
}

/// One entry of the user's externally hosted watch list, already typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalListEntry {
    pub external_id: ExternalId,
    pub status: WatchStatus,
    pub episodes_watched: u32,
    pub score: u8,
}

impl ExternalListEntry {
    /// Progress record for this entry in `partition`, stamped with `at`
    pub fn to_progress_record(&self, partition: &str, at: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord {
            partition: partition.to_string(),
            external_id: self.external_id,
            status: self.status,
            episodes_watched: self.episodes_watched,
            score: self.score,
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_accepts_list_spellings() {
        assert_eq!("plan to watch".parse::<WatchStatus>().unwrap(), WatchStatus::Planning);
        assert_eq!("on-hold".parse::<WatchStatus>().unwrap(), WatchStatus::OnHold);
        assert_eq!("Watching".parse::<WatchStatus>().unwrap(), WatchStatus::Watching);
        assert!("rewatching".parse::<WatchStatus>().is_err());
    }

    #[test]
    fn test_storage_form_round_trips() {
        for status in WatchStatus::ALL {
            assert_eq!(status.as_str().parse::<WatchStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_entry_to_progress_record() {
        let entry = ExternalListEntry {
            external_id: ExternalId(21),
            status: WatchStatus::Watching,
            episodes_watched: 900,
            score: 9,
        };
        let at = Utc::now();

        let record = entry.to_progress_record("library", at);

        assert_eq!(record.partition, "library");
        assert_eq!(record.external_id, ExternalId(21));
        assert_eq!(record.episodes_watched, 900);
        assert_eq!(record.updated_at, at);
    }
}
