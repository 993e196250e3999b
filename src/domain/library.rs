// src/domain/library.rs
//
// Read-only views over a merged library: sorting, title search and
// per-status counters (the numbers shown on a user's profile).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::domain::merged::MergedEntity;
use crate::domain::progress::WatchStatus;
use crate::domain::DomainError;

/// Sort order of a library view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortType {
    /// Score rank ascending, unranked titles last
    #[default]
    Rating,
    Popularity,
    Title,
    /// Soonest next episode first, titles without a schedule last
    NextAiringEpisode,
    /// Keep reconciliation order
    None,
}

impl FromStr for SortType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(SortType::Rating),
            "popularity" => Ok(SortType::Popularity),
            "title" => Ok(SortType::Title),
            "next_airing_episode" | "next airing episode" => Ok(SortType::NextAiringEpisode),
            "none" => Ok(SortType::None),
            other => Err(DomainError::InvariantViolation(format!(
                "Unknown sort type '{}'",
                other
            ))),
        }
    }
}

/// Known values first in ascending order, unknown values last
fn cmp_known_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable in-place sort of a library view
pub fn sort_library(entities: &mut [MergedEntity], sort: SortType) {
    match sort {
        SortType::Rating => {
            entities.sort_by(|a, b| cmp_known_first(a.entity.rank, b.entity.rank))
        }
        SortType::Popularity => entities.sort_by(|a, b| {
            cmp_known_first(a.entity.popularity_rank, b.entity.popularity_rank)
        }),
        SortType::Title => entities.sort_by(|a, b| {
            a.entity
                .title
                .to_lowercase()
                .cmp(&b.entity.title.to_lowercase())
        }),
        SortType::NextAiringEpisode => entities.sort_by(|a, b| {
            cmp_known_first(a.entity.next_episode_at, b.entity.next_episode_at)
        }),
        SortType::None => {}
    }
}

/// Entities whose title or English title contains `query`
pub fn filter_by_title(entities: &[MergedEntity], query: &str) -> Vec<MergedEntity> {
    entities
        .iter()
        .filter(|m| m.entity.matches_title(query))
        .cloned()
        .collect()
}

/// Per-status counters of a library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStatusCounts {
    pub planning: usize,
    pub watching: usize,
    pub completed: usize,
    pub on_hold: usize,
    pub dropped: usize,
    /// Entities without a progress record
    pub untracked: usize,
}

impl LibraryStatusCounts {
    pub fn from_entities(entities: &[MergedEntity]) -> Self {
        let mut counts = Self::default();
        for merged in entities {
            match merged.progress.as_ref().map(|p| p.status) {
                Some(WatchStatus::Planning) => counts.planning += 1,
                Some(WatchStatus::Watching) => counts.watching += 1,
                Some(WatchStatus::Completed) => counts.completed += 1,
                Some(WatchStatus::OnHold) => counts.on_hold += 1,
                Some(WatchStatus::Dropped) => counts.dropped += 1,
                None => counts.untracked += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: WatchStatus) -> usize {
        match status {
            WatchStatus::Planning => self.planning,
            WatchStatus::Watching => self.watching,
            WatchStatus::Completed => self.completed,
            WatchStatus::OnHold => self.on_hold,
            WatchStatus::Dropped => self.dropped,
        }
    }

    pub fn total(&self) -> usize {
        self.planning + self.watching + self.completed + self.on_hold + self.dropped + self.untracked
    }
}

/// Tracked entities grouped by status, keeping relative order inside a group
pub fn group_by_status(entities: &[MergedEntity]) -> BTreeMap<WatchStatus, Vec<MergedEntity>> {
    let mut groups: BTreeMap<WatchStatus, Vec<MergedEntity>> = BTreeMap::new();
    for merged in entities {
        if let Some(progress) = &merged.progress {
            groups.entry(progress.status).or_default().push(merged.clone());
        }
    }
    groups
}
