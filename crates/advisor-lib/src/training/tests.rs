//! Training pipeline tests

use super::*;
use crate::error::AdvisorError;
use crate::models::{FeatureVector, TrainingExample};
use crate::predictor::ForestConfig;
use crate::dataset::Dataset;
use crate::store::{ModelHandle, ModelStore};
use crate::test_support::{rice_maize_dataset, RICE_PROBE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn small_config(seed: u64) -> TrainingConfig {
    TrainingConfig {
        seed,
        forest: ForestConfig {
            n_trees: 25,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_default_training_config() {
    let config = TrainingConfig::default();
    assert_eq!(config.test_fraction, 0.2);
    assert_eq!(config.seed, 42);
    assert_eq!(config.forest.n_trees, 100);
}

#[test]
fn test_separable_dataset_trains_accurately() {
    let dataset = rice_maize_dataset(50, 1);
    let outcome = Trainer::new(small_config(42)).train(&dataset).unwrap();

    assert!(outcome.report.accuracy >= 0.9, "accuracy {}", outcome.report.accuracy);
    assert_eq!(outcome.unit.classes(), &["maize".to_string(), "rice".to_string()]);
    assert_eq!(outcome.report.n_samples, 20);

    let (label, probs) = outcome.unit.predict(&RICE_PROBE.to_array()).unwrap();
    assert_eq!(label, "rice");
    assert!(probs[1] >= 0.5);
}

#[test]
fn test_metadata_populated() {
    let dataset = rice_maize_dataset(30, 2);
    let outcome = Trainer::new(small_config(7)).train(&dataset).unwrap();
    let meta = outcome.unit.metadata();

    assert_eq!(meta.seed, 7);
    assert_eq!(meta.n_trees, 25);
    assert_eq!(meta.n_train, 48);
    assert_eq!(meta.n_test, 12);
    assert_eq!(meta.holdout_accuracy, Some(outcome.report.accuracy));
    assert_eq!(meta.classes, vec!["maize".to_string(), "rice".to_string()]);
}

#[test]
fn test_same_seed_same_result() {
    let dataset = rice_maize_dataset(40, 3);
    let a = Trainer::new(small_config(11)).train(&dataset).unwrap();
    let b = Trainer::new(small_config(11)).train(&dataset).unwrap();

    assert_eq!(a.report.accuracy, b.report.accuracy);
    assert_eq!(a.report, b.report);
    assert_eq!(a.unit.scaler(), b.unit.scaler());
    assert_eq!(a.unit.classifier(), b.unit.classifier());
}

#[test]
fn test_scaler_sees_only_training_rows() {
    let dataset = rice_maize_dataset(25, 4);
    let config = small_config(5);
    let outcome = Trainer::new(config.clone()).train(&dataset).unwrap();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = train_test_split(dataset.len(), config.test_fraction, &mut rng).unwrap();
    let n = split.train.len() as f64;
    let expected_rainfall_mean = split
        .train
        .iter()
        .map(|&i| dataset.examples()[i].features.rainfall)
        .sum::<f64>()
        / n;

    let params = outcome.unit.scaler().params().unwrap();
    assert!((params.mean[6] - expected_rainfall_mean).abs() < 1e-9);
}

#[test]
fn test_failed_training_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let handle = ModelHandle::new(dir.path().join("crop.model"));
    let store = ModelStore::default();

    // Every row identical: the scaler rejects zero variance
    let constant = Dataset::new(
        (0..10)
            .map(|i| TrainingExample {
                features: FeatureVector::DEFAULT,
                label: if i % 2 == 0 { "rice" } else { "maize" }.to_string(),
            })
            .collect(),
    );
    let err = Trainer::new(small_config(1))
        .train_and_save(&constant, &store, &handle)
        .unwrap_err();
    assert!(matches!(err, AdvisorError::InsufficientData(_)));
    assert!(!handle.exists());
}

#[test]
fn test_too_small_dataset() {
    let tiny = rice_maize_dataset(1, 0);
    let err = Trainer::new(small_config(1)).train(&tiny).unwrap_err();
    assert!(matches!(err, AdvisorError::InsufficientData(_)));
}

#[test]
fn test_train_and_save() {
    let dir = TempDir::new().unwrap();
    let handle = ModelHandle::new(dir.path().join("crop.model"));
    let store = ModelStore::default();
    let dataset = rice_maize_dataset(20, 6);

    let (outcome, stored) = Trainer::new(small_config(2))
        .train_and_save(&dataset, &store, &handle)
        .unwrap();

    assert_eq!(stored.version, outcome.unit.version());
    assert_eq!(store.load(&handle).unwrap(), outcome.unit);
}
