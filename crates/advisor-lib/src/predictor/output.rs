//! Prediction post-processing
//!
//! Confidence checks and the ranked view shown to operators.

use crate::models::CropPrediction;

/// Top probability below which a prediction is flagged
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub low_confidence_threshold: f64,
    /// Number of alternatives listed by `top_n`
    pub max_alternatives: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
            max_alternatives: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictionFormatter {
    config: OutputConfig,
}

impl PredictionFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_low_confidence(&self, prediction: &CropPrediction) -> bool {
        prediction.confidence() < self.config.low_confidence_threshold
    }

    /// Get the reason for low confidence (if applicable)
    pub fn low_confidence_reason(&self, prediction: &CropPrediction) -> Option<String> {
        if !self.is_low_confidence(prediction) {
            return None;
        }
        let ranked = prediction.ranked();
        match ranked.get(1) {
            Some((runner_up, p)) if prediction.confidence() - p < 0.1 => Some(format!(
                "Trees are split between {} and {}",
                prediction.label, runner_up
            )),
            _ => Some(format!(
                "Only {:.0}% of trees agree on {}",
                prediction.confidence() * 100.0,
                prediction.label
            )),
        }
    }

    /// Most probable classes with non-zero probability, best first
    pub fn top_n<'a>(&self, prediction: &'a CropPrediction) -> Vec<(&'a str, f64)> {
        prediction
            .ranked()
            .into_iter()
            .filter(|(_, p)| *p > 0.0)
            .take(self.config.max_alternatives.max(1))
            .collect()
    }

    /// One-line summary, e.g. `rice (92.0%)`
    pub fn summary(&self, prediction: &CropPrediction) -> String {
        let mut line = format!(
            "{} ({:.1}%)",
            prediction.label,
            prediction.confidence() * 100.0
        );
        if self.is_low_confidence(prediction) {
            line.push_str(" [low confidence]");
        }
        line
    }
}
