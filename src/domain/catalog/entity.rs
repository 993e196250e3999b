use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::DomainError;

/// Stable external identifier of a catalog title (MyAnimeList id).
///
/// Catalog entities, progress records and the external list are all keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub i64);

impl ExternalId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for ExternalId {
    fn from(value: i64) -> Self {
        ExternalId(value)
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical catalog record for an anime title.
///
/// Core fields are immutable once fetched from the remote catalog; a newer
/// fetch replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    /// External identifier, unique within a cache partition
    pub external_id: ExternalId,

    /// Primary title
    pub title: String,

    /// English title (if known)
    pub english_title: Option<String>,

    pub anime_type: AnimeType,

    pub airing_status: AiringStatus,

    /// Total number of episodes (if known)
    pub episodes: Option<u32>,

    /// Score rank, 1 is best
    pub rank: Option<u32>,

    /// Popularity rank, 1 is most popular
    pub popularity_rank: Option<u32>,

    pub poster_url: Option<String>,

    pub start_date: Option<NaiveDate>,

    /// Air time of the next episode while airing
    pub next_episode_at: Option<DateTime<Utc>>,
}

/// Type of anime work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimeType {
    TV,
    Movie,
    OVA,
    ONA,
    Special,
    Music,
}

/// Airing status of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiringStatus {
    NotYetAired,
    CurrentlyAiring,
    FinishedAiring,
}

impl CatalogEntity {
    /// Create a catalog entity with only the identifying fields set
    pub fn new(external_id: ExternalId, title: impl Into<String>) -> Self {
        Self {
            external_id,
            title: title.into(),
            english_title: None,
            anime_type: AnimeType::TV,
            airing_status: AiringStatus::FinishedAiring,
            episodes: None,
            rank: None,
            popularity_rank: None,
            poster_url: None,
            start_date: None,
            next_episode_at: None,
        }
    }

    /// Whether `query` matches either title, case-insensitively
    pub fn matches_title(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        self.title.to_lowercase().contains(&query)
            || self
                .english_title
                .as_ref()
                .map(|t| t.to_lowercase().contains(&query))
                .unwrap_or(false)
    }
}

impl std::fmt::Display for AnimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimeType::TV => write!(f, "TV"),
            AnimeType::Movie => write!(f, "Movie"),
            AnimeType::OVA => write!(f, "OVA"),
            AnimeType::ONA => write!(f, "ONA"),
            AnimeType::Special => write!(f, "Special"),
            AnimeType::Music => write!(f, "Music"),
        }
    }
}

impl FromStr for AnimeType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tv" => Ok(AnimeType::TV),
            "movie" => Ok(AnimeType::Movie),
            "ova" => Ok(AnimeType::OVA),
            "ona" => Ok(AnimeType::ONA),
            "special" => Ok(AnimeType::Special),
            "music" => Ok(AnimeType::Music),
            other => Err(DomainError::InvariantViolation(format!(
                "Unknown anime type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AiringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiringStatus::NotYetAired => write!(f, "not yet aired"),
            AiringStatus::CurrentlyAiring => write!(f, "currently airing"),
            AiringStatus::FinishedAiring => write!(f, "finished airing"),
        }
    }
}

impl FromStr for AiringStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not yet aired" => Ok(AiringStatus::NotYetAired),
            "currently airing" => Ok(AiringStatus::CurrentlyAiring),
            "finished airing" => Ok(AiringStatus::FinishedAiring),
            other => Err(DomainError::InvariantViolation(format!(
                "Unknown airing status '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anime_type_round_trips_through_display() {
        for tipo in [
            AnimeType::TV,
            AnimeType::Movie,
            AnimeType::OVA,
            AnimeType::ONA,
            AnimeType::Special,
            AnimeType::Music,
        ] {
            assert_eq!(tipo.to_string().parse::<AnimeType>().unwrap(), tipo);
        }
        assert!("Manga".parse::<AnimeType>().is_err());
    }

    #[test]
    fn test_airing_status_parsing_is_case_insensitive() {
        assert_eq!(
            "Currently Airing".parse::<AiringStatus>().unwrap(),
            AiringStatus::CurrentlyAiring
        );
        assert!("on break".parse::<AiringStatus>().is_err());
    }

    #[test]
    fn test_matches_title() {
        let mut entity = CatalogEntity::new(ExternalId(5114), "Hagane no Renkinjutsushi");
        entity.english_title = Some("Fullmetal Alchemist: Brotherhood".to_string());

        assert!(entity.matches_title("renkin"));
        assert!(entity.matches_title("FULLMETAL"));
        assert!(entity.matches_title("  "));
        assert!(!entity.matches_title("bebop"));
    }
}
