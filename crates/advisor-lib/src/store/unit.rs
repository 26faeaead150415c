//! The persisted model unit

use crate::error::{AdvisorError, Result};
use crate::models::FEATURE_COLUMNS;
use crate::predictor::{RandomForestClassifier, StandardScaler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance recorded alongside a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub n_trees: usize,
    pub feature_columns: Vec<String>,
    pub classes: Vec<String>,
    pub holdout_accuracy: Option<f64>,
    pub n_train: usize,
    pub n_test: usize,
}

impl ModelMetadata {
    pub fn new(seed: u64, n_trees: usize, classes: Vec<String>) -> Self {
        let trained_at = Utc::now();
        Self {
            version: format!("v{}", trained_at.format("%Y%m%d%H%M%S")),
            trained_at,
            seed,
            n_trees,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            classes,
            holdout_accuracy: None,
            n_train: 0,
            n_test: 0,
        }
    }
}

/// A fitted scaler and the classifier trained on its output
///
/// The two halves can only be constructed, saved and loaded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUnit {
    scaler: StandardScaler,
    classifier: RandomForestClassifier,
    metadata: ModelMetadata,
}

impl ModelUnit {
    pub fn new(
        scaler: StandardScaler,
        classifier: RandomForestClassifier,
        metadata: ModelMetadata,
    ) -> Result<Self> {
        let scaler_features = scaler
            .n_features()
            .ok_or(AdvisorError::NotFitted("StandardScaler"))?;
        let classifier_features = classifier
            .n_features()
            .ok_or(AdvisorError::NotFitted("RandomForestClassifier"))?;
        if scaler_features != classifier_features {
            return Err(AdvisorError::DimensionMismatch {
                expected: scaler_features,
                actual: classifier_features,
            });
        }

        Ok(Self {
            scaler,
            classifier,
            metadata,
        })
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &RandomForestClassifier {
        &self.classifier
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes().unwrap_or_default()
    }

    pub fn into_parts(self) -> (StandardScaler, RandomForestClassifier, ModelMetadata) {
        (self.scaler, self.classifier, self.metadata)
    }

    /// Scale one row and classify it with the same unit
    pub fn predict(&self, row: &[f64]) -> Result<(String, Vec<f64>)> {
        let scaled = self.scaler.transform(row)?;
        self.classifier.predict_with_probabilities(&scaled)
    }

    /// Consistency checks for a deserialized unit
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let scaler_features = self
            .scaler
            .n_features()
            .ok_or("scaler is not fitted")?;
        self.classifier.validate()?;
        if self.classifier.n_features() != Some(scaler_features) {
            return Err("scaler and classifier disagree on feature count".to_string());
        }
        if let Some(params) = self.scaler.params() {
            if params.std_dev.len() != scaler_features
                || params.std_dev.iter().any(|s| !s.is_finite() || *s <= 0.0)
            {
                return Err("scaler statistics are invalid".to_string());
            }
        }
        if self.metadata.classes != self.classes() {
            return Err("metadata classes do not match the classifier".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ForestConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fitted_parts(n_features: usize) -> (StandardScaler, RandomForestClassifier) {
        let x: Vec<Vec<f64>> = (0..6)
            .map(|i| (0..n_features).map(|j| (i * (j + 1)) as f64).collect())
            .collect();
        let y: Vec<String> = (0..6)
            .map(|i| if i < 3 { "maize" } else { "rice" }.to_string())
            .collect();
        let mut scaler = StandardScaler::new();
        scaler.fit(&x).unwrap();
        let scaled = scaler.transform_all(&x).unwrap();
        let mut classifier = RandomForestClassifier::new(ForestConfig {
            n_trees: 3,
            ..Default::default()
        });
        classifier
            .fit(&scaled, &y, &mut StdRng::seed_from_u64(1))
            .unwrap();
        (scaler, classifier)
    }

    fn metadata() -> ModelMetadata {
        ModelMetadata::new(1, 3, vec!["maize".to_string(), "rice".to_string()])
    }

    #[test]
    fn test_unit_requires_fitted_parts() {
        let (_, classifier) = fitted_parts(2);
        let err = ModelUnit::new(StandardScaler::new(), classifier, metadata()).unwrap_err();
        assert!(matches!(err, AdvisorError::NotFitted("StandardScaler")));

        let (scaler, _) = fitted_parts(2);
        let err =
            ModelUnit::new(scaler, RandomForestClassifier::default(), metadata()).unwrap_err();
        assert!(matches!(err, AdvisorError::NotFitted("RandomForestClassifier")));
    }

    #[test]
    fn test_unit_rejects_mismatched_parts() {
        let (scaler, _) = fitted_parts(2);
        let (_, classifier) = fitted_parts(3);
        let err = ModelUnit::new(scaler, classifier, metadata()).unwrap_err();
        assert!(matches!(err, AdvisorError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_unit_validates() {
        let (scaler, classifier) = fitted_parts(2);
        let unit = ModelUnit::new(scaler, classifier, metadata()).unwrap();
        assert!(unit.validate().is_ok());
        assert_eq!(unit.classes(), &["maize".to_string(), "rice".to_string()]);
        let (label, probs) = unit.predict(&[5.0, 10.0]).unwrap();
        assert_eq!(label, "rice");
        assert_eq!(probs.len(), 2);
    }

    #[test]
    fn test_metadata_version_format() {
        let meta = metadata();
        assert!(meta.version.starts_with('v'));
        assert_eq!(meta.version.len(), 15);
        assert_eq!(meta.feature_columns.len(), 7);
    }
}
