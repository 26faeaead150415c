//! Labeled dataset loading
//!
//! Reads a headed CSV table whose last column is the crop label and whose
//! preceding columns are the seven features in `FEATURE_COLUMNS` order.
//! Feature cells are parsed as numbers; nothing else is transformed.

use crate::error::{AdvisorError, Result};
use crate::models::{FeatureVector, TrainingExample, FEATURE_COLUMNS, LABEL_COLUMN, NUM_FEATURES};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// In-memory training table
#[derive(Debug, Clone)]
pub struct Dataset {
    examples: Vec<TrainingExample>,
}

impl Dataset {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Distinct labels in lexicographic order
    pub fn classes(&self) -> Vec<String> {
        self.examples
            .iter()
            .map(|e| e.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Loads datasets from CSV files
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    label_column: String,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            label_column: LABEL_COLUMN.to_string(),
        }
    }

    pub fn with_label_column(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
        }
    }

    /// Load a dataset from a CSV file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|e| {
            AdvisorError::DataFormat(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let dataset = self.read_table(reader)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            classes = dataset.classes().len(),
            "Loaded training dataset"
        );
        Ok(dataset)
    }

    /// Load a dataset from any CSV byte stream
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<Dataset> {
        self.read_table(csv::Reader::from_reader(reader))
    }

    fn read_table<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<Dataset> {
        let headers = reader
            .headers()
            .map_err(|e| AdvisorError::DataFormat(format!("Failed to read headers: {}", e)))?
            .clone();

        self.validate_headers(&headers)?;

        let mut examples = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            // Header is line 1
            let line = idx + 2;
            let record = record
                .map_err(|e| AdvisorError::DataFormat(format!("Line {}: {}", line, e)))?;
            examples.push(self.parse_record(&record, line)?);
        }

        if examples.is_empty() {
            return Err(AdvisorError::DataFormat(
                "Dataset contains no rows".to_string(),
            ));
        }

        debug!(rows = examples.len(), "Parsed dataset records");
        Ok(Dataset::new(examples))
    }

    fn validate_headers(&self, headers: &csv::StringRecord) -> Result<()> {
        let columns: Vec<&str> = headers.iter().map(str::trim).collect();

        match columns.last() {
            Some(last) if *last == self.label_column => {}
            _ => {
                return Err(AdvisorError::DataFormat(format!(
                    "Label column '{}' missing; last column must hold the label (found {:?})",
                    self.label_column, columns
                )))
            }
        }

        let features = &columns[..columns.len() - 1];
        if features != FEATURE_COLUMNS {
            return Err(AdvisorError::DataFormat(format!(
                "Feature columns must be {:?} in that order, found {:?}",
                FEATURE_COLUMNS, features
            )));
        }
        Ok(())
    }

    fn parse_record(&self, record: &csv::StringRecord, line: usize) -> Result<TrainingExample> {
        if record.len() != NUM_FEATURES + 1 {
            return Err(AdvisorError::DataFormat(format!(
                "Line {}: expected {} fields, found {}",
                line,
                NUM_FEATURES + 1,
                record.len()
            )));
        }

        let mut values = [0.0f64; NUM_FEATURES];
        for (col, value) in values.iter_mut().enumerate() {
            let raw = record[col].trim();
            *value = raw.parse::<f64>().map_err(|_| {
                AdvisorError::DataFormat(format!(
                    "Line {}: column '{}' is not numeric: {:?}",
                    line, FEATURE_COLUMNS[col], raw
                ))
            })?;
            if !value.is_finite() {
                return Err(AdvisorError::DataFormat(format!(
                    "Line {}: column '{}' is not finite",
                    line, FEATURE_COLUMNS[col]
                )));
            }
        }

        let label = record[NUM_FEATURES].trim();
        if label.is_empty() {
            return Err(AdvisorError::DataFormat(format!(
                "Line {}: empty label",
                line
            )));
        }

        Ok(TrainingExample {
            features: FeatureVector::from_array(values),
            label: label.to_string(),
        })
    }
}
