use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeOptions;
use crate::{AUCTIONS_ENDED_URL, DEFAULT_DB_PATH, DEFAULT_SNAPSHOT_PATH};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "AUCTION_ARCHIVE_CONFIG";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Auction API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Database and snapshot locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

/// Ingestion filters and debug output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Keep only Buy-It-Now auctions.
    #[serde(default)]
    pub bin_only: bool,
    /// When set, the raw API payload is written here before parsing.
    #[serde(default)]
    pub raw_payload_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    AUCTIONS_ENDED_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_PATH)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl IngestConfig {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            bin_only: self.bin_only,
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Resolve and load the config for this invocation.
    ///
    /// An explicit path (flag or `AUCTION_ARCHIVE_CONFIG`) must exist. Without
    /// one, `config.toml` is used when present and defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
            let config = Self::load(&path)?;
            return Ok((config, Some(path)));
        }

        let default_path = PathBuf::from(CONFIG_PATH);
        if default_path.exists() {
            let config = Self::load(&default_path)?;
            return Ok((config, Some(default_path)));
        }
        Ok((Self::default(), None))
    }
}
