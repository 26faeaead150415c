//! Model persistence
//!
//! This module provides:
//! - The matched (scaler, classifier) model unit and its metadata
//! - Atomic, checksummed save/load of model units on the filesystem

mod model_store;
mod unit;

pub use model_store::{
    compute_checksum, ModelHandle, ModelStore, StoreConfig, StoredModel, FORMAT_VERSION,
    MODEL_FORMAT,
};
pub use unit::{ModelMetadata, ModelUnit};
