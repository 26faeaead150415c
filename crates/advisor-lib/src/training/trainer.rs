//! Training orchestration: split, fit scaler, fit forest, evaluate

use super::metrics::{evaluate, EvaluationReport};
use super::split::{train_test_split, DEFAULT_TEST_FRACTION};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::predictor::{ForestConfig, RandomForestClassifier, StandardScaler};
use crate::store::{ModelHandle, ModelMetadata, ModelStore, ModelUnit, StoredModel};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 42;

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the split and for every tree
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            forest: ForestConfig::default(),
        }
    }
}

/// Product of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub unit: ModelUnit,
    pub report: EvaluationReport,
    pub duration: Duration,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a model unit and evaluate it on the held-out rows
    ///
    /// The scaler only ever sees training-split rows.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let split = train_test_split(dataset.len(), self.config.test_fraction, &mut rng)?;
        let (train_x, train_y) = columns(dataset, &split.train);
        let (test_x, test_y) = columns(dataset, &split.test);

        debug!(
            n_train = train_x.len(),
            n_test = test_x.len(),
            seed = self.config.seed,
            "Dataset split"
        );

        let mut scaler = StandardScaler::new();
        scaler.fit(&train_x)?;
        let scaled_train = scaler.transform_all(&train_x)?;

        let mut classifier = RandomForestClassifier::new(self.config.forest.clone());
        classifier.fit(&scaled_train, &train_y, &mut rng)?;

        let predictions = scaler
            .transform_all(&test_x)?
            .iter()
            .map(|row| classifier.predict(row))
            .collect::<Result<Vec<_>>>()?;
        let report = evaluate(&test_y, &predictions);

        let classes = classifier.classes().unwrap_or_default().to_vec();
        let mut metadata = ModelMetadata::new(self.config.seed, classifier.n_trees(), classes);
        metadata.holdout_accuracy = Some(report.accuracy);
        metadata.n_train = train_x.len();
        metadata.n_test = test_x.len();

        let unit = ModelUnit::new(scaler, classifier, metadata)?;
        let duration = start.elapsed();

        info!(
            version = %unit.version(),
            accuracy = report.accuracy,
            n_train = train_x.len(),
            n_test = test_x.len(),
            classes = unit.classes().len(),
            elapsed_ms = duration.as_millis() as u64,
            "Training completed"
        );

        Ok(TrainingOutcome {
            unit,
            report,
            duration,
        })
    }

    /// Train, then persist only if every stage succeeded
    pub fn train_and_save(
        &self,
        dataset: &Dataset,
        store: &ModelStore,
        handle: &ModelHandle,
    ) -> Result<(TrainingOutcome, StoredModel)> {
        let outcome = self.train(dataset)?;
        let stored = store.save(handle, &outcome.unit)?;
        Ok((outcome, stored))
    }
}

fn columns(dataset: &Dataset, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<String>) {
    let examples = dataset.examples();
    indices
        .iter()
        .map(|&i| {
            let example = &examples[i];
            (example.features.to_array().to_vec(), example.label.clone())
        })
        .unzip()
}
