//! `crop train`

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

use advisor_lib::predictor::ForestConfig;
use advisor_lib::store::StoredModel;
use advisor_lib::training::{EvaluationReport, Trainer, TrainingConfig};
use advisor_lib::{DatasetLoader, ModelHandle, ModelStore};

use crate::config::Config;
use crate::output::{format_probability, print_info, print_json, print_success, print_table, OutputFormat};
use crate::TrainArgs;

const DEFAULT_DATASET: &str = "Crop_recommendation.csv";

/// Row for the per-class metrics table
#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Crop")]
    label: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

#[derive(Serialize)]
struct TrainOutput<'a> {
    model: &'a StoredModel,
    report: &'a EvaluationReport,
    duration_ms: u128,
}

pub fn run(args: TrainArgs, config: &Config, model_path: &Path, format: OutputFormat) -> Result<()> {
    let dataset_path = args
        .dataset
        .or_else(|| config.dataset_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));

    let dataset = DatasetLoader::new()
        .load(&dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    if format == OutputFormat::Table {
        print_info(&format!(
            "Loaded {} rows with {} crops from {}",
            dataset.len(),
            dataset.classes().len(),
            dataset_path.display()
        ));
    }

    let trainer = Trainer::new(TrainingConfig {
        test_fraction: args.test_fraction,
        seed: args.seed,
        forest: ForestConfig {
            n_trees: args.trees,
            max_depth: args.max_depth,
            ..Default::default()
        },
    });
    let (outcome, stored) = trainer
        .train_and_save(&dataset, &ModelStore::default(), &ModelHandle::new(model_path))
        .context("Training failed")?;

    match format {
        OutputFormat::Json => print_json(&TrainOutput {
            model: &stored,
            report: &outcome.report,
            duration_ms: outcome.duration.as_millis(),
        })?,
        OutputFormat::Table => {
            println!();
            println!(
                "{} {}",
                "Model Accuracy:".bold(),
                format_probability(outcome.report.accuracy).green().bold()
            );
            let rows: Vec<ClassRow> = outcome
                .report
                .per_class
                .iter()
                .chain([&outcome.report.macro_avg, &outcome.report.weighted_avg])
                .map(|m| ClassRow {
                    label: m.label.clone(),
                    precision: format!("{:.2}", m.precision),
                    recall: format!("{:.2}", m.recall),
                    f1: format!("{:.2}", m.f1),
                    support: m.support,
                })
                .collect();
            print_table(&rows);
            print_success(&format!(
                "Saved model {} to {} in {:.1}s",
                stored.version,
                stored.path.display(),
                outcome.duration.as_secs_f64()
            ));
        }
    }

    Ok(())
}
