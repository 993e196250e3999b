// src/domain/merged.rs
//
// Merged view of catalog data and user progress.
//
// A MergedEntity is a join produced per reconciliation; catalog entities and
// progress records stay separately owned and are never persisted together.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::catalog::{CatalogEntity, ExternalId};
use crate::domain::progress::ProgressRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedEntity {
    pub entity: CatalogEntity,

    /// Present iff a progress record with the same external id existed at merge time
    pub progress: Option<ProgressRecord>,
}

impl MergedEntity {
    pub fn new(entity: CatalogEntity, progress: Option<ProgressRecord>) -> Self {
        Self { entity, progress }
    }

    pub fn external_id(&self) -> ExternalId {
        self.entity.external_id
    }
}

/// Collapse duplicate ids, keeping the position of the first occurrence.
pub fn dedup_ids<I>(ids: I) -> Vec<ExternalId>
where
    I: IntoIterator<Item = ExternalId>,
{
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Union of locally present and freshly fetched entities, one per id.
///
/// Fetched entities replace present ones with the same id. The result follows
/// the order of `ids`; entities whose id is not in `ids` are appended in
/// ascending id order.
pub fn merge_catalog(
    ids: &[ExternalId],
    present: Vec<CatalogEntity>,
    fetched: Vec<CatalogEntity>,
) -> Vec<CatalogEntity> {
    let mut by_id: HashMap<ExternalId, CatalogEntity> = HashMap::new();

    for entity in present {
        by_id.entry(entity.external_id).or_insert(entity);
    }
    for entity in fetched {
        by_id.insert(entity.external_id, entity);
    }

    let mut merged = Vec::with_capacity(by_id.len());
    for id in ids {
        if let Some(entity) = by_id.remove(id) {
            merged.push(entity);
        }
    }

    let mut extras: Vec<CatalogEntity> = by_id.into_values().collect();
    extras.sort_by_key(|e| e.external_id);
    merged.extend(extras);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i64, title: &str) -> CatalogEntity {
        CatalogEntity::new(ExternalId(id), title)
    }

    fn ids(raw: &[i64]) -> Vec<ExternalId> {
        raw.iter().copied().map(ExternalId).collect()
    }

    #[test]
    fn test_dedup_ids_keeps_first_position() {
        assert_eq!(dedup_ids(ids(&[3, 1, 3, 2, 1])), ids(&[3, 1, 2]));
    }

    #[test]
    fn test_merge_follows_id_order() {
        let merged = merge_catalog(
            &ids(&[3, 1, 2]),
            vec![entity(1, "Cowboy Bebop"), entity(2, "Trigun")],
            vec![entity(3, "Monster")],
        );

        let order: Vec<i64> = merged.iter().map(|e| e.external_id.value()).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn test_fetched_wins_on_conflict() {
        let merged = merge_catalog(&ids(&[1]), vec![entity(1, "A")], vec![entity(1, "B")]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "B");
    }

    #[test]
    fn test_unrequested_entities_are_appended() {
        let merged = merge_catalog(
            &ids(&[2]),
            vec![entity(2, "Trigun")],
            vec![entity(9, "Extra B"), entity(7, "Extra A")],
        );

        let order: Vec<i64> = merged.iter().map(|e| e.external_id.value()).collect();
        assert_eq!(order, vec![2, 7, 9]);
    }

    #[test]
    fn test_ids_missing_everywhere_are_skipped() {
        let merged = merge_catalog(&ids(&[1, 2, 3]), vec![entity(1, "Cowboy Bebop")], vec![]);
        assert_eq!(merged.len(), 1);
    }
}
