//! Random forest classifier
//!
//! Each tree is grown on a bootstrap resample of the training rows with a
//! random feature subset considered at every split. Prediction is a
//! majority vote; a class's probability is the fraction of trees voting
//! for it.

use super::tree::{DecisionTree, TreeParams};
use crate::error::{AdvisorError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Default number of trees in the ensemble
pub const DEFAULT_N_TREES: usize = 100;

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    /// Maximum tree depth (unlimited when `None`)
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split (`floor(sqrt(n_features))` when `None`)
    pub max_features: Option<usize>,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    fn resolved_max_features(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedForest {
    trees: Vec<DecisionTree>,
    /// Class order used to index probability vectors
    classes: Vec<String>,
    n_features: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: ForestConfig,
    fitted: Option<FittedForest>,
}

impl RandomForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Distinct training labels, in probability-vector order
    pub fn classes(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.classes.as_slice())
    }

    pub fn n_features(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.n_features)
    }

    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }

    /// Train the ensemble; all randomness is drawn from `rng`
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        x: &[Vec<f64>],
        labels: &[String],
        rng: &mut R,
    ) -> Result<()> {
        if self.fitted.is_some() {
            return Err(AdvisorError::AlreadyFitted("RandomForestClassifier"));
        }
        if x.is_empty() {
            return Err(AdvisorError::InsufficientData(
                "RandomForestClassifier needs at least one training row".to_string(),
            ));
        }
        if x.len() != labels.len() {
            return Err(AdvisorError::DataFormat(format!(
                "{} feature rows but {} labels",
                x.len(),
                labels.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(AdvisorError::InsufficientData(
                "RandomForestClassifier needs at least one tree".to_string(),
            ));
        }

        let n_features = x[0].len();
        if n_features == 0 {
            return Err(AdvisorError::DataFormat(
                "training rows have no features".to_string(),
            ));
        }
        if let Some(bad) = x.iter().find(|r| r.len() != n_features) {
            return Err(AdvisorError::DimensionMismatch {
                expected: n_features,
                actual: bad.len(),
            });
        }

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let y: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split.max(2),
            max_features: self.config.resolved_max_features(n_features),
            n_classes: classes.len(),
        };

        let n_samples = x.len();
        let trees: Vec<DecisionTree> = (0..self.config.n_trees)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let sample: Vec<usize> = if self.config.bootstrap {
                    (0..n_samples)
                        .map(|_| tree_rng.gen_range(0..n_samples))
                        .collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(x, &y, sample, &params, &mut tree_rng)
            })
            .collect();

        debug!(
            n_trees = trees.len(),
            n_classes = classes.len(),
            n_samples = n_samples,
            max_features = params.max_features,
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "Random forest fitted"
        );

        self.fitted = Some(FittedForest {
            trees,
            classes,
            n_features,
        });
        Ok(())
    }

    fn fitted(&self) -> Result<&FittedForest> {
        self.fitted
            .as_ref()
            .ok_or(AdvisorError::NotFitted("RandomForestClassifier"))
    }

    fn votes(&self, row: &[f64]) -> Result<(&FittedForest, Vec<usize>)> {
        let forest = self.fitted()?;
        if row.len() != forest.n_features {
            return Err(AdvisorError::DimensionMismatch {
                expected: forest.n_features,
                actual: row.len(),
            });
        }
        let mut votes = vec![0usize; forest.classes.len()];
        for tree in &forest.trees {
            votes[tree.predict(row)] += 1;
        }
        Ok((forest, votes))
    }

    /// Class with the most votes; ties go to the earlier class
    pub fn predict(&self, row: &[f64]) -> Result<String> {
        self.predict_with_probabilities(row).map(|(label, _)| label)
    }

    /// Vote fractions in class order
    pub fn predict_probabilities(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.predict_with_probabilities(row).map(|(_, probs)| probs)
    }

    /// Label and probabilities computed from one round of voting
    pub fn predict_with_probabilities(&self, row: &[f64]) -> Result<(String, Vec<f64>)> {
        let (forest, votes) = self.votes(row)?;
        let winner = super::tree::majority_class(&votes);
        let n_trees = forest.trees.len() as f64;
        let probabilities = votes.iter().map(|&v| v as f64 / n_trees).collect();
        Ok((forest.classes[winner].clone(), probabilities))
    }

    /// Structural checks used after deserialization
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let forest = self.fitted.as_ref().ok_or("classifier is not fitted")?;
        if forest.trees.is_empty() {
            return Err("classifier has no trees".to_string());
        }
        if forest.classes.is_empty() {
            return Err("classifier has no classes".to_string());
        }
        for tree in &forest.trees {
            let (feature, class) = tree.root().max_indices();
            if feature >= forest.n_features || class >= forest.classes.len() {
                return Err("tree references an unknown feature or class".to_string());
            }
        }
        Ok(())
    }
}
