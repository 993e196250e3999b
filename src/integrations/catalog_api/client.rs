// src/integrations/catalog_api/client.rs
//
// Remote anime catalog over a Parse-compatible REST API.
//
// ARCHITECTURE:
// - GET {base}/classes/Anime?where=<json>&limit=N
// - Application id and REST key sent as headers on every request
// - Records map to CatalogEntity here; nothing is cached
//
// CRITICAL RULES:
// - This is INFRASTRUCTURE, not DOMAIN
// - Malformed records fail the whole call with AppError::Validation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::domain::catalog::{
    validate_catalog_entity, AiringStatus, AnimeType, CatalogEntity, ExternalId,
};
use crate::domain::DomainError;
use crate::error::{AppError, AppResult};
use crate::integrations::gateways::{CatalogQuery, RemoteCatalogGateway};

const APPLICATION_ID_HEADER: &str = "X-Parse-Application-Id";
const REST_API_KEY_HEADER: &str = "X-Parse-REST-API-Key";

/// `find` response envelope
#[derive(Debug, Deserialize)]
struct FindResponse {
    results: Vec<Value>,
}

/// Anime object as stored by the catalog backend
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnimeRecord {
    #[serde(rename = "myAnimeListID")]
    my_anime_list_id: Option<i64>,
    title: Option<String>,
    english_title: Option<String>,
    #[serde(rename = "type")]
    anime_type: Option<String>,
    status: Option<String>,
    episodes: Option<i64>,
    rank: Option<i64>,
    popularity_rank: Option<i64>,
    image_url: Option<String>,
    start_date: Option<ParseDate>,
    next_episode_date: Option<ParseDate>,
}

/// `{"__type": "Date", "iso": "..."}`
#[derive(Debug, Deserialize)]
struct ParseDate {
    iso: String,
}

impl ParseDate {
    fn to_utc(&self) -> AppResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.iso)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::Validation(format!("Invalid date '{}': {}", self.iso, e)))
    }
}

fn invalid(err: DomainError) -> AppError {
    AppError::Validation(err.to_string())
}

/// Zero and negative counters mean "unknown" upstream
fn positive(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

impl AnimeRecord {
    fn into_entity(self) -> AppResult<CatalogEntity> {
        let id = self
            .my_anime_list_id
            .ok_or_else(|| AppError::Validation("Catalog record without myAnimeListID".into()))?;

        let title = self
            .title
            .ok_or_else(|| AppError::Validation(format!("Catalog record {} has no title", id)))?;

        let anime_type = match self.anime_type.as_deref() {
            Some(raw) => raw.parse::<AnimeType>().map_err(invalid)?,
            None => {
                return Err(AppError::Validation(format!(
                    "Catalog record {} has no type",
                    id
                )))
            }
        };

        let airing_status = match self.status.as_deref() {
            Some(raw) => raw.parse::<AiringStatus>().map_err(invalid)?,
            None => {
                return Err(AppError::Validation(format!(
                    "Catalog record {} has no status",
                    id
                )))
            }
        };

        let start_date: Option<NaiveDate> = self
            .start_date
            .map(|d| d.to_utc().map(|dt| dt.date_naive()))
            .transpose()?;

        let next_episode_at = self
            .next_episode_date
            .map(|d| d.to_utc())
            .transpose()?;

        let entity = CatalogEntity {
            external_id: ExternalId(id),
            title,
            english_title: self.english_title.filter(|t| !t.trim().is_empty()),
            anime_type,
            airing_status,
            episodes: positive(self.episodes),
            rank: positive(self.rank),
            popularity_rank: positive(self.popularity_rank),
            poster_url: self.image_url.filter(|u| !u.is_empty()),
            start_date,
            next_episode_at,
        };

        validate_catalog_entity(&entity).map_err(invalid)?;
        Ok(entity)
    }
}

/// Map a `find` result list to entities
fn parse_results(results: Vec<Value>) -> AppResult<Vec<CatalogEntity>> {
    results
        .into_iter()
        .map(|raw| {
            let record: AnimeRecord = serde_json::from_value(raw)
                .map_err(|e| AppError::Validation(format!("Malformed catalog record: {}", e)))?;
            record.into_entity()
        })
        .collect()
}

/// Catalog API client
pub struct CatalogApiClient {
    base_url: String,
    http_client: Client,
    application_id: String,
    rest_api_key: String,
}

impl CatalogApiClient {
    pub fn new(
        base_url: &str,
        application_id: impl Into<String>,
        rest_api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            application_id: application_id.into(),
            rest_api_key: rest_api_key.into(),
        })
    }

    fn find_url(&self, where_clause: &Value, limit: usize) -> AppResult<Url> {
        Url::parse_with_params(
            &format!("{}/classes/Anime", self.base_url),
            &[
                ("where", where_clause.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .map_err(|e| AppError::Validation(format!("Invalid catalog URL '{}': {}", self.base_url, e)))
    }

    async fn find(&self, where_clause: &Value, limit: usize) -> AppResult<Vec<CatalogEntity>> {
        let url = self.find_url(where_clause, limit)?;

        let response = self
            .http_client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .header(APPLICATION_ID_HEADER, &self.application_id)
            .header(REST_API_KEY_HEADER, &self.rest_api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body: FindResponse = response.json().await?;
        parse_results(body.results)
    }
}

/// 4xx means the request itself is wrong; anything else may succeed on retry
fn status_error(status: StatusCode) -> AppError {
    let message = format!("Catalog API returned status: {}", status);
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        AppError::Validation(message)
    } else {
        AppError::Network(message)
    }
}

#[async_trait]
impl RemoteCatalogGateway for CatalogApiClient {
    async fn fetch_by_ids(
        &self,
        ids: &HashSet<ExternalId>,
        max_batch: usize,
    ) -> AppResult<Vec<CatalogEntity>> {
        if ids.len() > max_batch {
            return Err(AppError::Validation(format!(
                "Requested {} ids, batch limit is {}",
                ids.len(),
                max_batch
            )));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut raw_ids: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        raw_ids.sort_unstable();

        let where_clause = json!({ "myAnimeListID": { "$in": raw_ids } });
        let entities = self.find(&where_clause, ids.len()).await?;

        log::debug!(
            "Catalog returned {} of {} requested entities",
            entities.len(),
            ids.len()
        );
        Ok(entities)
    }

    async fn query(&self, query: &CatalogQuery) -> AppResult<Vec<CatalogEntity>> {
        self.find(&query.to_where_clause(), query.limit).await
    }
}
