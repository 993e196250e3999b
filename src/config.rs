// src/config.rs
//
// Sync configuration
//
// Loaded from a JSON file; every field is optional and falls back to its
// default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::get_database_path;
use crate::error::{AppError, AppResult};
use crate::services::{ReconcileOptions, DEFAULT_MAX_BATCH, PIN_PARTITION_PREFIX};

/// Partition holding the user's library
pub const DEFAULT_LIBRARY_PARTITION: &str = "library";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// SQLite file holding cache, progress and sync state
    pub database_path: PathBuf,

    /// Connection pool size
    pub pool_size: u32,

    pub library_partition: String,

    /// Refresh the library once it is this many calendar days old
    pub max_age_days: u32,

    /// Upper bound on ids per remote catalog request
    pub max_batch: usize,

    pub catalog: CatalogApiConfig,

    pub list_provider: ListProviderConfig,

    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogApiConfig {
    pub base_url: String,
    pub application_id: String,
    pub rest_api_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListProviderConfig {
    pub base_url: String,
    pub username: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_path: get_database_path().unwrap_or_else(|_| PathBuf::from("animenow.db")),
            pool_size: 4,
            library_partition: DEFAULT_LIBRARY_PARTITION.to_string(),
            max_age_days: 1,
            max_batch: DEFAULT_MAX_BATCH,
            catalog: CatalogApiConfig::default(),
            list_provider: ListProviderConfig::default(),
            http_timeout_secs: 30,
        }
    }
}

impl Default for CatalogApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.parse.com/1".to_string(),
            application_id: String::new(),
            rest_api_key: String::new(),
        }
    }
}

impl Default for ListProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.atarashiiapp.com/2".to_string(),
            username: String::new(),
        }
    }
}

impl SyncConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SyncConfig = serde_json::from_str(&raw)?;
        config.validate()?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `load` when the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> AppResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.library_partition.trim().is_empty() {
            return Err(AppError::Validation(
                "library_partition cannot be empty".to_string(),
            ));
        }
        if self.library_partition.starts_with(PIN_PARTITION_PREFIX) {
            return Err(AppError::Validation(format!(
                "library_partition cannot start with '{}'",
                PIN_PARTITION_PREFIX
            )));
        }
        if self.max_batch == 0 {
            return Err(AppError::Validation("max_batch must be positive".to_string()));
        }
        if self.pool_size == 0 {
            return Err(AppError::Validation("pool_size must be positive".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Validation(
                "http_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            max_batch: self.max_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_age_days, 1);
        assert_eq!(config.max_batch, 1000);
        assert_eq!(config.library_partition, "library");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "max_batch": 250, "list_provider": {{ "username": "spike" }} }}"#
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();

        assert_eq!(config.max_batch, 250);
        assert_eq!(config.list_provider.username, "spike");
        assert_eq!(config.list_provider.base_url, ListProviderConfig::default().base_url);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_batch": 0 }}"#).unwrap();

        assert!(matches!(
            SyncConfig::load(file.path()),
            Err(AppError::Validation(_))
        ));

        let config = SyncConfig {
            library_partition: "  ".to_string(),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_library_partition_cannot_use_pin_prefix() {
        let config = SyncConfig {
            library_partition: "pin:Spring 2024".to_string(),
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(matches!(
            SyncConfig::load(file.path()),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }
}
