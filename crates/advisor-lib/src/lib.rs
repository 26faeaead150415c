//! Crop advisor library
//!
//! This crate provides the core functionality for:
//! - Loading labelled soil and climate datasets
//! - Training a standardizing scaler and random forest as one model unit
//! - Persisting and restoring model units
//! - Live sensor input with an offline fallback
//! - Crop recommendation with class probabilities
//! - Weather and energy reporting utilities, plus observability

pub mod dataset;
pub mod energy;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod sensor;
pub mod store;
pub mod training;
pub mod weather;

#[cfg(test)]
mod test_support;

pub use dataset::{Dataset, DatasetLoader};
pub use error::{AdvisorError, Result};
pub use models::*;
pub use observability::{AdvisorMetrics, StructuredLogger};
pub use predictor::{CropPredictor, Predictor};
pub use store::{ModelHandle, ModelStore, ModelUnit};
