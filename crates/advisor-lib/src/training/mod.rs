//! Model training and held-out evaluation

mod metrics;
mod split;
mod trainer;

#[cfg(test)]
mod tests;

pub use metrics::{evaluate, ClassMetrics, EvaluationReport};
pub use split::{train_test_split, SplitIndices, DEFAULT_TEST_FRACTION};
pub use trainer::{Trainer, TrainingConfig, TrainingOutcome, DEFAULT_SEED};
