//! Scaling, classification and the inference facade

mod forest;
mod inference;
mod output;
mod scaler;
mod tree;

pub use forest::{ForestConfig, RandomForestClassifier, DEFAULT_N_TREES};
pub use inference::{CropPredictor, InferenceStats};
pub use output::{OutputConfig, PredictionFormatter, LOW_CONFIDENCE_THRESHOLD};
pub use scaler::{ScalerParams, StandardScaler};
pub use tree::{gini, majority_class, DecisionTree, TreeNode};

use crate::error::Result;
use crate::models::{CropPrediction, FeatureVector};

/// Anything that can turn a feature vector into a crop recommendation
pub trait Predictor: Send + Sync {
    fn predict_crop(&self, features: &FeatureVector) -> Result<CropPrediction>;

    /// Version of the active model, if any
    fn model_version(&self) -> Option<String>;
}
