//! Predictor facade
//!
//! Holds the active model unit and turns one feature vector into one
//! `CropPrediction`. The label and probability vector are computed under
//! a single read of the active unit.

use super::Predictor;
use crate::error::{AdvisorError, Result};
use crate::models::{CropPrediction, FeatureVector, NUM_FEATURES};
use crate::sensor::{SensorAdapter, SensorReading, SensorSource};
use crate::store::{ModelHandle, ModelStore, ModelUnit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

pub struct CropPredictor {
    unit: RwLock<Option<ModelUnit>>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    not_ready_count: AtomicU64,
}

impl CropPredictor {
    /// Create a predictor with no model; `predict_crop` fails until one
    /// is installed
    pub fn new() -> Self {
        Self {
            unit: RwLock::new(None),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
            not_ready_count: AtomicU64::new(0),
        }
    }

    pub fn with_model(unit: ModelUnit) -> Result<Self> {
        let predictor = Self::new();
        predictor.install(unit)?;
        Ok(predictor)
    }

    /// Replace the active unit
    pub fn install(&self, unit: ModelUnit) -> Result<()> {
        let n_features = unit.classifier().n_features().unwrap_or(0);
        if n_features != NUM_FEATURES {
            return Err(AdvisorError::DimensionMismatch {
                expected: NUM_FEATURES,
                actual: n_features,
            });
        }

        let version = unit.version().to_string();
        let mut guard = self.unit.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(unit);
        info!(version = %version, "Model unit installed");
        Ok(())
    }

    /// Load a persisted unit and make it active
    pub fn load_from(&self, store: &ModelStore, handle: &ModelHandle) -> Result<()> {
        let unit = store.load(handle)?;
        self.install(unit)
    }

    pub fn is_ready(&self) -> bool {
        self.unit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Classes of the active unit, in probability order
    pub fn classes(&self) -> Option<Vec<String>> {
        self.unit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|unit| unit.classes().to_vec())
    }

    /// Read the sensor (or its fallback) and classify the result
    pub fn predict_from_sensor<S: SensorSource>(
        &self,
        adapter: &mut SensorAdapter<S>,
    ) -> Result<(SensorReading, CropPrediction)> {
        let reading = adapter.read();
        let prediction = self.predict_crop(reading.features())?;
        Ok((reading, prediction))
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            not_ready: self.not_ready_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for CropPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for CropPredictor {
    fn predict_crop(&self, features: &FeatureVector) -> Result<CropPrediction> {
        let start = Instant::now();

        let guard = self.unit.read().unwrap_or_else(PoisonError::into_inner);
        let unit = match guard.as_ref() {
            Some(unit) => unit,
            None => {
                self.not_ready_count.fetch_add(1, Ordering::Relaxed);
                return Err(AdvisorError::ModelNotReady);
            }
        };

        let (label, probabilities) = unit.predict(&features.to_array())?;
        let prediction = CropPrediction {
            label,
            classes: unit.classes().to_vec(),
            probabilities,
            model_version: unit.version().to_string(),
            generated_at: chrono::Utc::now().timestamp(),
        };
        drop(guard);

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        Ok(prediction)
    }

    fn model_version(&self) -> Option<String> {
        self.unit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|unit| unit.version().to_string())
    }
}

/// Inference statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    /// Calls rejected because no model was active
    pub not_ready: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::NoSensor;
    use crate::test_support::{trained_unit, RICE_PROBE};
    use tempfile::TempDir;

    #[test]
    fn test_predict_before_model_is_not_ready() {
        let predictor = CropPredictor::new();
        let err = predictor.predict_crop(&RICE_PROBE).unwrap_err();
        assert!(matches!(err, AdvisorError::ModelNotReady));
        assert!(!predictor.is_ready());
        assert_eq!(predictor.model_version(), None);
        assert_eq!(predictor.stats().not_ready, 1);
        assert_eq!(predictor.stats().total_inferences, 0);
    }

    #[test]
    fn test_predict_rice_probe() {
        let predictor = CropPredictor::with_model(trained_unit(25)).unwrap();
        let prediction = predictor.predict_crop(&RICE_PROBE).unwrap();

        assert_eq!(prediction.label, "rice");
        assert!(prediction.confidence() >= 0.5);
        assert_eq!(prediction.classes, vec!["maize".to_string(), "rice".to_string()]);
        let sum: f64 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(Some(prediction.model_version), predictor.model_version());
        assert_eq!(predictor.stats().total_inferences, 1);
    }

    #[test]
    fn test_label_consistent_with_probabilities() {
        let predictor = CropPredictor::with_model(trained_unit(9)).unwrap();
        for features in [RICE_PROBE, FeatureVector::DEFAULT] {
            let prediction = predictor.predict_crop(&features).unwrap();
            let (top, p) = prediction.ranked()[0];
            assert_eq!(p, prediction.confidence());
            assert_eq!(prediction.probability_of(top), Some(p));
        }
    }

    #[test]
    fn test_sensor_fallback_uses_default_vector() {
        let predictor = CropPredictor::with_model(trained_unit(9)).unwrap();
        let mut adapter = SensorAdapter::new(NoSensor);

        let (reading, prediction) = predictor.predict_from_sensor(&mut adapter).unwrap();
        assert!(reading.is_fallback());
        let direct = predictor.predict_crop(&FeatureVector::DEFAULT).unwrap();
        assert_eq!(prediction.label, direct.label);
        assert_eq!(prediction.probabilities, direct.probabilities);
    }

    #[test]
    fn test_load_from_store() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::default();
        let handle = ModelHandle::new(dir.path().join("model.bin"));
        let unit = trained_unit(7);
        store.save(&handle, &unit).unwrap();

        let predictor = CropPredictor::new();
        predictor.load_from(&store, &handle).unwrap();
        assert!(predictor.is_ready());
        assert_eq!(predictor.model_version().as_deref(), Some(unit.version()));
    }

    #[test]
    fn test_load_missing_model_keeps_predictor_empty() {
        let dir = TempDir::new().unwrap();
        let predictor = CropPredictor::new();
        let err = predictor
            .load_from(&ModelStore::default(), &ModelHandle::new(dir.path().join("none")))
            .unwrap_err();
        assert!(matches!(err, AdvisorError::ModelNotFound(_)));
        assert!(!predictor.is_ready());
    }

    #[test]
    fn test_install_replaces_unit() {
        let predictor = CropPredictor::with_model(trained_unit(3)).unwrap();
        predictor.install(trained_unit(5)).unwrap();
        assert_eq!(predictor.classes().unwrap().len(), 2);
    }
}
