//! `crop model`

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use advisor_lib::store::{ModelMetadata, StoredModel};
use advisor_lib::{ModelHandle, ModelStore};

use crate::output::{format_probability, print_json, OutputFormat};

#[derive(Serialize)]
struct ModelInfo<'a> {
    file: &'a StoredModel,
    metadata: &'a ModelMetadata,
}

/// Show metadata of the saved model
pub fn show_info(model_path: &Path, format: OutputFormat) -> Result<()> {
    let store = ModelStore::default();
    let handle = ModelHandle::new(model_path);
    let stored = store
        .describe(&handle)
        .with_context(|| format!("Failed to read model {}", model_path.display()))?;
    let unit = store.load(&handle)?;
    let metadata = unit.metadata();

    match format {
        OutputFormat::Json => print_json(&ModelInfo {
            file: &stored,
            metadata,
        })?,
        OutputFormat::Table => {
            println!("{}", "Model".bold());
            println!("{}", "=".repeat(50));
            println!("Version:                {}", metadata.version.cyan());
            println!("Path:                   {}", stored.path.display());
            println!("Trained at:             {}", metadata.trained_at.to_rfc3339());
            println!("Seed:                   {}", metadata.seed);
            println!("Trees:                  {}", metadata.n_trees);
            println!(
                "Rows (train/test):      {}/{}",
                metadata.n_train, metadata.n_test
            );
            match metadata.holdout_accuracy {
                Some(acc) => println!("Held-out accuracy:      {}", format_probability(acc).green()),
                None => println!("Held-out accuracy:      {}", "n/a".dimmed()),
            }
            println!("Size:                   {} bytes", stored.size_bytes);
            println!("Checksum:               {}", stored.checksum.dimmed());
            println!();
            println!("{}", "Features".bold());
            println!("{}", "-".repeat(50));
            println!("{}", metadata.feature_columns.join(", "));
            println!();
            println!("{} ({})", "Crops".bold(), metadata.classes.len());
            println!("{}", "-".repeat(50));
            println!("{}", metadata.classes.join(", "));
        }
    }

    Ok(())
}
