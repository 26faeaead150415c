//! Synthetic datasets shared by unit tests

use crate::dataset::Dataset;
use crate::models::{FeatureVector, TrainingExample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A probe well inside the rice cluster
pub const RICE_PROBE: FeatureVector = FeatureVector {
    nitrogen: 80.0,
    phosphorus: 47.0,
    potassium: 40.0,
    temperature: 23.5,
    humidity: 82.5,
    ph: 6.4,
    rainfall: 236.0,
};

/// Rice and maize rows separable on potassium, humidity and rainfall
pub fn rice_maize_dataset(per_class: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut examples = Vec::with_capacity(per_class * 2);
    for _ in 0..per_class {
        examples.push(TrainingExample {
            features: FeatureVector {
                nitrogen: rng.gen_range(60.0..99.0),
                phosphorus: rng.gen_range(35.0..60.0),
                potassium: rng.gen_range(35.0..45.0),
                temperature: rng.gen_range(20.0..27.0),
                humidity: rng.gen_range(80.0..85.0),
                ph: rng.gen_range(5.0..7.8),
                rainfall: rng.gen_range(180.0..300.0),
            },
            label: "rice".to_string(),
        });
        examples.push(TrainingExample {
            features: FeatureVector {
                nitrogen: rng.gen_range(60.0..100.0),
                phosphorus: rng.gen_range(35.0..60.0),
                potassium: rng.gen_range(15.0..25.0),
                temperature: rng.gen_range(18.0..27.0),
                humidity: rng.gen_range(55.0..75.0),
                ph: rng.gen_range(5.5..7.0),
                rainfall: rng.gen_range(60.0..110.0),
            },
            label: "maize".to_string(),
        });
    }
    Dataset::new(examples)
}

/// A small forest trained on [`rice_maize_dataset`]
pub fn trained_unit(n_trees: usize) -> crate::store::ModelUnit {
    use crate::predictor::ForestConfig;
    use crate::training::{Trainer, TrainingConfig};

    let config = TrainingConfig {
        forest: ForestConfig {
            n_trees,
            ..Default::default()
        },
        ..Default::default()
    };
    Trainer::new(config)
        .train(&rice_maize_dataset(40, 7))
        .unwrap()
        .unit
}
