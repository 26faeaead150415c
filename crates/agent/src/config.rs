//! Agent configuration

use advisor_lib::predictor::{ForestConfig, DEFAULT_N_TREES};
use advisor_lib::training::{TrainingConfig, DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use advisor_lib::weather::{WeatherConfig, DEFAULT_BASE_URL, DEFAULT_GEOCODING_URL};
use advisor_lib::{FeatureVector, NUM_FEATURES};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "CROP_AGENT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "crop-agent.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Site identifier attached to every log event
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Labeled CSV used when a model has to be trained
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Train even when a persisted model exists
    #[serde(default)]
    pub retrain: bool,

    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// `host:port` of the sensor bridge; no sensor when unset
    #[serde(default)]
    pub sensor_addr: Option<String>,

    #[serde(default = "default_sensor_timeout_ms")]
    pub sensor_timeout_ms: u64,

    /// Replacement for the built-in fallback feature vector
    #[serde(default)]
    pub default_features: Option<Vec<f64>>,

    /// City for the weather report; skipped when unset
    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub weather_api_key: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    /// Prometheus textfile written after each run
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,

    /// Seconds between predictions; 0 runs once and exits
    #[serde(default)]
    pub interval_secs: u64,
}

fn default_site_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string())
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("Crop_recommendation.csv")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("crop_predictor.model")
}

fn default_n_trees() -> usize {
    DEFAULT_N_TREES
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_test_fraction() -> f64 {
    DEFAULT_TEST_FRACTION
}

fn default_sensor_timeout_ms() -> u64 {
    2000
}

fn default_weather_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_geocoding_url() -> String {
    DEFAULT_GEOCODING_URL.to_string()
}

impl AgentConfig {
    /// Load configuration from the config file and `CROP_*` environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::from_sources(Some(Path::new(&file)), config::Environment::with_prefix("CROP"))
    }

    /// Environment values take precedence over the file
    pub fn from_sources(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        let config: AgentConfig = builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            bail!("n_trees must be at least 1");
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            bail!("test_fraction must be between 0 and 1, got {}", self.test_fraction);
        }
        self.default_features()?;
        Ok(())
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
            forest: ForestConfig {
                n_trees: self.n_trees,
                max_depth: self.max_depth,
                ..Default::default()
            },
        }
    }

    pub fn default_features(&self) -> Result<FeatureVector> {
        match &self.default_features {
            None => Ok(FeatureVector::DEFAULT),
            Some(values) => {
                let array: [f64; NUM_FEATURES] = values.as_slice().try_into().with_context(|| {
                    format!(
                        "default_features needs {} values, got {}",
                        NUM_FEATURES,
                        values.len()
                    )
                })?;
                let features = FeatureVector::from_array(array);
                if !features.is_finite() {
                    bail!("default_features must be finite numbers");
                }
                Ok(features)
            }
        }
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    /// Weather settings, when both a city and an API key are configured
    pub fn weather(&self) -> Option<(String, WeatherConfig)> {
        let city = self.city.clone()?;
        let api_key = self.weather_api_key.clone()?;
        Some((
            city,
            WeatherConfig {
                api_key,
                base_url: self.weather_base_url.clone(),
                geocoding_url: self.geocoding_url.clone(),
            },
        ))
    }
}
