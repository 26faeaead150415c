//! Core data models for the crop advisor

use serde::{Deserialize, Serialize};

/// Number of agronomic measurements in a feature vector
pub const NUM_FEATURES: usize = 7;

/// Column names in the order every component expects them
pub const FEATURE_COLUMNS: [&str; NUM_FEATURES] =
    ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];

/// Name of the label column in the training dataset
pub const LABEL_COLUMN: &str = "label";

/// Feature vector for crop recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl FeatureVector {
    /// Historical sample used when no live reading is available
    pub const DEFAULT: FeatureVector = FeatureVector {
        nitrogen: 26.0,
        phosphorus: 73.0,
        potassium: 21.0,
        temperature: 31.33170829,
        humidity: 57.97429171,
        ph: 4.946263888,
        rainfall: 161.7820226,
    };

    pub fn from_array(values: [f64; NUM_FEATURES]) -> Self {
        Self {
            nitrogen: values[0],
            phosphorus: values[1],
            potassium: values[2],
            temperature: values[3],
            humidity: values[4],
            ph: values[5],
            rainfall: values[6],
        }
    }

    /// Values in `FEATURE_COLUMNS` order
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One labeled row of the training table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: String,
}

/// Result of a single inference call
///
/// The label and probabilities always come from the same model state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropPrediction {
    pub label: String,
    /// Class labels in the order the probabilities are indexed
    pub classes: Vec<String>,
    pub probabilities: Vec<f64>,
    pub model_version: String,
    pub generated_at: i64,
}

impl CropPrediction {
    /// Probability assigned to the predicted label
    pub fn confidence(&self) -> f64 {
        self.probability_of(&self.label).unwrap_or(0.0)
    }

    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.classes
            .iter()
            .position(|c| c == label)
            .map(|idx| self.probabilities[idx])
    }

    /// (label, probability) pairs, most probable first
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut pairs: Vec<(&str, f64)> = self
            .classes
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().copied())
            .collect();
        // Stable sort keeps class order among equal probabilities
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }
}
