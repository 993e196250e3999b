// src/domain/sync_state.rs
//
// Last successful sync of a cache partition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub partition: String,
    pub last_synced_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(partition: impl Into<String>, last_synced_at: DateTime<Utc>) -> Self {
        Self {
            partition: partition.into(),
            last_synced_at,
        }
    }

    /// Calendar days between the last sync and `now` (UTC dates).
    ///
    /// 23:50 yesterday to 00:10 today is one day; 00:10 to 23:50 the same day
    /// is zero. Negative when the stored timestamp lies in the future.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.last_synced_at.date_naive()).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_age_counts_calendar_days_not_hours() {
        let synced = Utc.with_ymd_and_hms(2024, 3, 1, 23, 50, 0).unwrap();
        let state = SyncState::new("library", synced);

        let next_morning = Utc.with_ymd_and_hms(2024, 3, 2, 0, 10, 0).unwrap();
        assert_eq!(state.age_in_days(next_morning), 1);

        let same_day = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        assert_eq!(state.age_in_days(same_day), 0);
    }

    #[test]
    fn test_future_timestamp_gives_negative_age() {
        let state = SyncState::new("library", Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(state.age_in_days(now), -4);
    }
}
