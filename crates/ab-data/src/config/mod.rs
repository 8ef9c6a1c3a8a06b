//! Application configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DataError;

/// File looked for in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "abada.json";

/// Database connection and browsing limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file; `None` opens an in-memory database
    pub path: Option<PathBuf>,

    /// Table whose rows name the recordings to analyse
    pub source_table: Option<String>,

    /// Hard cap on rows read per query
    pub max_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: None, source_table: None, max_rows: 10000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub event_csv: PathBuf,
    pub segment_csv: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            event_csv: PathBuf::from("abada_event_data.csv"),
            segment_csv: PathBuf::from("abada_segment_data.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when `path` is
    /// `None`. A missing default file yields the defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, DataError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| DataError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, DataError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.database.max_rows == 0 {
            return Err(DataError::Config("database.max_rows must be positive".to_string()));
        }
        Ok(())
    }
}
