//! One recommendation cycle: model, sensor, prediction, reports

use crate::config::AgentConfig;
use advisor_lib::energy::{EnergyEstimate, EnergyEstimator, EnergyTable};
use advisor_lib::predictor::PredictionFormatter;
use advisor_lib::sensor::{
    NoSensor, SensorAdapter, SensorReading, SensorSource, TcpSensorConfig, TcpSensorSource,
};
use advisor_lib::training::Trainer;
use advisor_lib::weather::{CityWeather, WeatherClient, WeatherService};
use advisor_lib::{
    AdvisorError, AdvisorMetrics, CropPrediction, CropPredictor, DatasetLoader, ModelHandle,
    ModelStore, ModelUnit, StructuredLogger,
};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Everything produced by one cycle
#[derive(Debug)]
pub struct CycleReport {
    pub reading: SensorReading,
    pub prediction: CropPrediction,
    pub low_confidence: Option<String>,
    pub weather: Option<CityWeather>,
    pub energy: Option<EnergyEstimate>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = self.reading.fallback_reason() {
            writeln!(f, "Sensor unavailable ({}); using default values", reason)?;
        }
        writeln!(f, "Predicted crop: {}", self.prediction.label)?;
        writeln!(f, "Prediction probabilities:")?;
        for (crop, p) in self
            .prediction
            .classes
            .iter()
            .zip(&self.prediction.probabilities)
        {
            writeln!(f, "{}: {:.2}", crop, p)?;
        }
        if let Some(reason) = &self.low_confidence {
            writeln!(f, "Low confidence: {}", reason)?;
        }
        if let Some(w) = &self.weather {
            writeln!(
                f,
                "Weather in {}, {}: {:.1}°C, {:.0}% humidity, {:.1} mm rain (1h)",
                w.location.name,
                w.location.country,
                w.weather.temperature,
                w.weather.humidity,
                w.weather.rainfall_1h
            )?;
        }
        if let Some(e) = &self.energy {
            writeln!(
                f,
                "Estimated energy for {} over {} days: {:.2} kWh",
                e.crop, e.days, e.total_kwh
            )?;
        }
        Ok(())
    }
}

pub struct Pipeline {
    config: AgentConfig,
    predictor: CropPredictor,
    adapter: SensorAdapter<Box<dyn SensorSource + Send>>,
    formatter: PredictionFormatter,
    weather: Option<(String, WeatherClient)>,
    energy: EnergyEstimator,
    logger: StructuredLogger,
    metrics: AdvisorMetrics,
}

impl Pipeline {
    /// Load or train the model unit and wire up the collaborators
    pub fn build(config: AgentConfig, logger: StructuredLogger, metrics: AdvisorMetrics) -> Result<Self> {
        let unit = obtain_model(&config, &logger, &metrics)?;
        metrics.set_model_version(unit.version(), unit.classes().len());
        let predictor = CropPredictor::with_model(unit)?;

        let source: Box<dyn SensorSource + Send> = match &config.sensor_addr {
            Some(addr) => Box::new(TcpSensorSource::new(
                TcpSensorConfig::new(addr.clone()).with_timeout(config.sensor_timeout()),
            )),
            None => Box::new(NoSensor),
        };
        let adapter = SensorAdapter::with_default(source, config.default_features()?);

        let weather = match config.weather() {
            Some((city, weather_config)) => {
                let client = WeatherClient::new(weather_config)
                    .context("Failed to configure weather client")?;
                Some((city, client))
            }
            None => None,
        };

        Ok(Self {
            config,
            predictor,
            adapter,
            formatter: PredictionFormatter::new(),
            weather,
            energy: EnergyEstimator::new(EnergyTable::default(), StdRng::from_entropy()),
            logger,
            metrics,
        })
    }

    pub fn model_version(&self) -> String {
        use advisor_lib::Predictor;
        self.predictor.model_version().unwrap_or_default()
    }

    /// Read the sensor, predict and gather the optional reports
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        let predictor = &self.predictor;
        let adapter = &mut self.adapter;
        let result = tokio::task::block_in_place(|| predictor.predict_from_sensor(adapter));
        let (reading, prediction) = match result {
            Ok(ok) => ok,
            Err(e) => {
                self.metrics.inc_prediction_errors();
                return Err(e).context("Prediction failed");
            }
        };
        self.metrics.observe_prediction_latency(start.elapsed());
        self.metrics.inc_predictions();

        if let Some(reason) = reading.fallback_reason() {
            self.metrics.inc_sensor_fallbacks();
            self.logger.log_sensor_fallback(reason);
        }
        self.logger.log_prediction(&prediction, !reading.is_fallback());

        let weather = match &self.weather {
            Some((city, client)) => match client.weather_for_city(city).await {
                Ok(weather) => Some(weather),
                Err(e) => {
                    warn!(city = %city, error = %e, "Weather report unavailable");
                    None
                }
            },
            None => None,
        };

        let energy = match self.energy.estimate_season(&prediction.label) {
            Ok(estimate) => Some(estimate),
            Err(AdvisorError::UnknownCrop(crop)) => {
                warn!(crop = %crop, "No energy data for predicted crop");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(path) = &self.config.metrics_path {
            if let Err(e) = self.metrics.write_textfile(path) {
                warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
            }
        }

        Ok(CycleReport {
            low_confidence: self.formatter.low_confidence_reason(&prediction),
            reading,
            prediction,
            weather,
            energy,
        })
    }
}

/// Load the persisted unit, or train and persist a new one
pub fn obtain_model(
    config: &AgentConfig,
    logger: &StructuredLogger,
    metrics: &AdvisorMetrics,
) -> Result<ModelUnit> {
    let store = ModelStore::default();
    let handle = ModelHandle::new(&config.model_path);

    if !config.retrain {
        match store.load(&handle) {
            Ok(unit) => {
                logger.log_model_loaded(unit.version(), handle.path());
                return Ok(unit);
            }
            Err(AdvisorError::ModelNotFound(_)) => {
                info!(path = %handle, "No persisted model, training a new one");
            }
            Err(e @ AdvisorError::ModelCorrupt { .. }) => {
                warn!(error = %e, "Persisted model is unusable, retraining");
            }
            Err(e) => return Err(e).context("Failed to load model"),
        }
    }

    let dataset = DatasetLoader::new()
        .load(&config.dataset_path)
        .with_context(|| format!("Failed to load dataset {}", config.dataset_path.display()))?;
    let (outcome, stored) = Trainer::new(config.training_config())
        .train_and_save(&dataset, &store, &handle)
        .context("Training failed")?;

    metrics.observe_training(outcome.duration, &outcome.report);
    logger.log_training(outcome.unit.version(), &outcome.report, outcome.duration);
    logger.log_model_saved(&stored);
    info!("\n{}", outcome.report);
    Ok(outcome.unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_dataset(path: &Path) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "N,P,K,temperature,humidity,ph,rainfall,label").unwrap();
        for i in 0..30 {
            let jitter = (i % 7) as f64;
            writeln!(
                file,
                "{},{},{},{},{},{},{},rice",
                80.0 + jitter,
                45.0 - jitter,
                40.0 + jitter * 0.5,
                23.0 + jitter * 0.2,
                82.0 + jitter * 0.3,
                6.2 + jitter * 0.05,
                220.0 + jitter * 5.0
            )
            .unwrap();
            writeln!(
                file,
                "{},{},{},{},{},{},{},maize",
                78.0 + jitter,
                48.0 - jitter,
                20.0 + jitter * 0.5,
                22.0 + jitter * 0.2,
                65.0 + jitter * 0.3,
                6.0 + jitter * 0.05,
                85.0 + jitter * 3.0
            )
            .unwrap();
        }
    }

    fn config(dir: &TempDir, vars: &[(&str, String)]) -> AgentConfig {
        let dataset = dir.path().join("crops.csv");
        write_dataset(&dataset);
        let mut map: HashMap<String, String> = HashMap::from([
            ("CROP_DATASET_PATH".to_string(), dataset.display().to_string()),
            (
                "CROP_MODEL_PATH".to_string(),
                dir.path().join("crop.model").display().to_string(),
            ),
            ("CROP_N_TREES".to_string(), "10".to_string()),
        ]);
        for (k, v) in vars {
            map.insert(k.to_string(), v.clone());
        }
        AgentConfig::from_sources(None, config::Environment::with_prefix("CROP").source(Some(map)))
            .unwrap()
    }

    #[test]
    fn test_obtain_model_trains_then_loads() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &[]);
        let logger = StructuredLogger::new("test");
        let metrics = AdvisorMetrics::new();

        let trained = obtain_model(&config, &logger, &metrics).unwrap();
        assert!(config.model_path.exists());

        let loaded = obtain_model(&config, &logger, &metrics).unwrap();
        assert_eq!(trained, loaded);
    }

    #[test]
    fn test_corrupt_model_is_retrained() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &[]);
        std::fs::write(&config.model_path, b"garbage").unwrap();

        let unit =
            obtain_model(&config, &StructuredLogger::new("test"), &AdvisorMetrics::new()).unwrap();
        assert_eq!(unit.classes(), &["maize".to_string(), "rice".to_string()]);
    }

    #[test]
    fn test_missing_dataset_fails() {
        let dir = TempDir::new().unwrap();
        let config = config(
            &dir,
            &[(
                "CROP_DATASET_PATH",
                dir.path().join("missing.csv").display().to_string(),
            )],
        );
        assert!(obtain_model(&config, &StructuredLogger::new("t"), &AdvisorMetrics::new()).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cycle_without_sensor_uses_default() {
        let dir = TempDir::new().unwrap();
        let metrics_path = dir.path().join("advisor.prom");
        let config = config(
            &dir,
            &[("CROP_METRICS_PATH", metrics_path.display().to_string())],
        );

        let mut pipeline =
            Pipeline::build(config, StructuredLogger::new("test"), AdvisorMetrics::new()).unwrap();
        let report = pipeline.run_cycle().await.unwrap();

        assert!(report.reading.is_fallback());
        assert!(report.weather.is_none());
        assert!(report.energy.is_some());
        assert!(metrics_path.exists());

        let text = report.to_string();
        assert!(text.contains("using default values"));
        assert!(text.contains(&format!("Predicted crop: {}", report.prediction.label)));
        assert!(text.contains("Prediction probabilities:"));
    }
}
