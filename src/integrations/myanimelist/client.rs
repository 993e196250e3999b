// src/integrations/myanimelist/client.rs
//
// The user's MyAnimeList watch list through an Atarashii-compatible API.
//
// GET {base}/animelist/{username}
//   -> {"anime": [{"id", "watched_status", "watched_episodes", "score", ...}]}
//
// Entries are validated into ExternalListEntry; the client never writes
// progress itself.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::catalog::ExternalId;
use crate::domain::progress::{ExternalListEntry, WatchStatus, MAX_SCORE};
use crate::error::{AppError, AppResult};
use crate::integrations::gateways::ExternalListProvider;

#[derive(Debug, Deserialize)]
struct AnimeListResponse {
    anime: Vec<RawListEntry>,
}

/// One list row as served; every field is checked before use
#[derive(Debug, Deserialize)]
struct RawListEntry {
    id: Option<i64>,
    watched_status: Option<String>,
    watched_episodes: Option<i64>,
    score: Option<i64>,
}

impl RawListEntry {
    fn into_entry(self) -> AppResult<ExternalListEntry> {
        let id = self
            .id
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::Validation("List entry without a valid id".to_string()))?;

        let status = self
            .watched_status
            .as_deref()
            .ok_or_else(|| AppError::Validation(format!("List entry {} has no status", id)))?
            .parse::<WatchStatus>()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let episodes_watched = u32::try_from(self.watched_episodes.unwrap_or(0)).map_err(|_| {
            AppError::Validation(format!("List entry {} has a negative episode count", id))
        })?;

        let score = self.score.unwrap_or(0);
        if !(0..=MAX_SCORE as i64).contains(&score) {
            return Err(AppError::Validation(format!(
                "List entry {} has score {} outside 0..={}",
                id, score, MAX_SCORE
            )));
        }

        Ok(ExternalListEntry {
            external_id: ExternalId(id),
            status,
            episodes_watched,
            score: score as u8,
        })
    }
}

fn parse_list(body: AnimeListResponse) -> AppResult<Vec<ExternalListEntry>> {
    body.anime.into_iter().map(RawListEntry::into_entry).collect()
}

/// Watch-list client bound to one user
pub struct MyAnimeListClient {
    base_url: String,
    username: String,
    http_client: Client,
}

impl MyAnimeListClient {
    pub fn new(base_url: &str, username: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(AppError::Validation(
                "A MyAnimeList username is required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            http_client,
        })
    }

    /// The username is pushed as a single path segment, so `/`, `?` and
    /// `#` in it are percent-encoded instead of reshaping the request.
    fn list_url(&self) -> AppResult<Url> {
        let invalid = |reason: String| {
            AppError::Validation(format!("Invalid list URL '{}': {}", self.base_url, reason))
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .push("animelist")
            .push(&self.username);
        Ok(url)
    }
}

#[async_trait]
impl ExternalListProvider for MyAnimeListClient {
    async fn fetch_list(&self) -> AppResult<Vec<ExternalListEntry>> {
        let url = self.list_url()?;

        let response = self
            .http_client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AppError::Validation(format!(
                    "No anime list for user '{}'",
                    self.username
                )))
            }
            status => {
                return Err(AppError::Network(format!(
                    "List provider returned status: {}",
                    status
                )))
            }
        }

        let body: AnimeListResponse = response.json().await?;
        let entries = parse_list(body)?;

        log::info!(
            "Fetched {} list entries for '{}'",
            entries.len(),
            self.username
        );
        Ok(entries)
    }
}
