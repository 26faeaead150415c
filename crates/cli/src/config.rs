//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the location of the CLI config file
pub const CONFIG_PATH_ENV: &str = "CROP_CLI_CONFIG";

pub const DEFAULT_MODEL_PATH: &str = "crop_predictor.model";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default model file
    pub model_path: Option<PathBuf>,
    /// Default training dataset
    pub dataset_path: Option<PathBuf>,
    /// Default city for `crop weather`
    pub city: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Model path from the flag, then the config file, then the default
    pub fn resolve_model_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.model_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs_next::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("crop-advisor").join("config.json"))
    }
}
