//! Settings file support.
//!
//! Settings live in `<config_dir>/config.toml`. Every field has a default, so a
//! missing file or a missing section falls back silently.

use crate::aggregate::Thresholds;
use crate::error::{GridRankError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/gridrank/";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "gridrank.db";
pub const API_KEY_ENV: &str = "GRIDRANK_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rank_api: RankApiSettings,
    pub geocoder: GeocoderSettings,
    pub scan: ScanSettings,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankApiSettings {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub credits_per_lookup: f64,
    pub timeout_secs: u64,
    /// Used only for duration estimates.
    pub assumed_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub workers: usize,
    pub request_interval_ms: u64,
    pub grid_size: usize,
    pub radius_km: f64,
}

impl Default for RankApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            api_key: None,
            credits_per_lookup: 1.0,
            timeout_secs: 30,
            assumed_latency_ms: 2000,
        }
    }
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("gridrank/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            request_interval_ms: 0,
            grid_size: 5,
            radius_km: 5.0,
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            GridRankError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GridRankError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Load `<config_dir>/config.toml`, or defaults if it does not exist, then
    /// apply environment overrides.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut settings = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        settings.apply_env(std::env::var(API_KEY_ENV).ok());
        Ok(settings)
    }

    pub fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.rank_api.api_key = Some(key);
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GridRankError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Expand `~` in a user-supplied config directory.
pub fn resolve_config_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn database_path(config_dir: &Path) -> PathBuf {
    config_dir.join(DATABASE_FILE_NAME)
}
