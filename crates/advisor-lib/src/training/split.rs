//! Deterministic train/test splitting

use crate::error::{AdvisorError, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Fraction of rows held out for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Row indices assigned to each side of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_samples` and hold out `ceil(n_samples * test_fraction)` rows
pub fn train_test_split<R: Rng + ?Sized>(
    n_samples: usize,
    test_fraction: f64,
    rng: &mut R,
) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AdvisorError::InvalidConfig(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(AdvisorError::InsufficientData(format!(
            "cannot split {} rows with test fraction {}",
            n_samples, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);
    let test = indices.split_off(n_samples - n_test);

    Ok(SplitIndices {
        train: indices,
        test,
    })
}
