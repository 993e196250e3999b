// src/integrations/gateways.rs
//
// Remote capabilities the sync services depend on.
//
// CRITICAL RULES:
// - Implementations validate at the boundary: malformed remote data is
//   AppError::Validation, never a panic
// - No implicit caching; callers decide what to persist

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::domain::catalog::{AnimeType, CatalogEntity, ExternalId};
use crate::domain::progress::ExternalListEntry;
use crate::error::AppResult;

/// Remote source of record for catalog entities
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCatalogGateway: Send + Sync {
    /// Fetch entities by id. Ids unknown upstream are simply absent.
    ///
    /// Fails with `Validation` when `ids.len() > max_batch`; chunking is the
    /// caller's job.
    async fn fetch_by_ids(
        &self,
        ids: &HashSet<ExternalId>,
        max_batch: usize,
    ) -> AppResult<Vec<CatalogEntity>>;

    async fn query(&self, query: &CatalogQuery) -> AppResult<Vec<CatalogEntity>>;
}

/// The authenticated user's externally hosted watch list
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalListProvider: Send + Sync {
    async fn fetch_list(&self) -> AppResult<Vec<ExternalListEntry>>;
}

/// Catalog query by season and/or type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Season label, e.g. "Spring 2024"
    pub season: Option<String>,
    pub anime_type: Option<AnimeType>,
    pub limit: usize,
}

impl CatalogQuery {
    pub fn season(season: impl Into<String>) -> Self {
        Self {
            season: Some(season.into()),
            anime_type: None,
            limit: 1000,
        }
    }

    pub fn with_type(mut self, anime_type: AnimeType) -> Self {
        self.anime_type = Some(anime_type);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Constraint object in the catalog API's `where` syntax
    pub fn to_where_clause(&self) -> Value {
        let mut clause = Map::new();
        if let Some(season) = &self.season {
            clause.insert("season".to_string(), json!(season));
        }
        if let Some(anime_type) = &self.anime_type {
            clause.insert("type".to_string(), json!(anime_type.to_string()));
        }
        Value::Object(clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_includes_only_set_fields() {
        let query = CatalogQuery::season("Spring 2024");
        assert_eq!(query.to_where_clause(), json!({ "season": "Spring 2024" }));

        let query = CatalogQuery::season("Fall 2023").with_type(AnimeType::Movie);
        assert_eq!(
            query.to_where_clause(),
            json!({ "season": "Fall 2023", "type": "Movie" })
        );
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = CatalogQuery {
            season: None,
            anime_type: None,
            limit: 10,
        };
        assert_eq!(query.to_where_clause(), json!({}));
    }
}
