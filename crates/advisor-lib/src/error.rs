//! Error taxonomy for the crop advisor

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Malformed dataset: {0}")]
    DataFormat(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    #[error("{0} is already fitted")]
    AlreadyFitted(&'static str),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model not found at {0}")]
    ModelNotFound(PathBuf),

    #[error("Model at {path} is corrupt: {reason}")]
    ModelCorrupt { path: PathBuf, reason: String },

    #[error("No trained or loaded model is available")]
    ModelNotReady,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No energy data available for crop: {0}")]
    UnknownCrop(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdvisorError>;

impl AdvisorError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AdvisorError::ModelCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdvisorError::NotFitted("StandardScaler");
        assert_eq!(err.to_string(), "StandardScaler has not been fitted");

        let err = AdvisorError::DimensionMismatch {
            expected: 7,
            actual: 6,
        };
        assert_eq!(
            err.to_string(),
            "Feature dimension mismatch: expected 7, got 6"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AdvisorError>();
        assert_sync::<AdvisorError>();
    }
}
