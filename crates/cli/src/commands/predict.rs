//! `crop predict`

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;

use advisor_lib::predictor::{OutputConfig, PredictionFormatter};
use advisor_lib::sensor::{
    NoSensor, ReaderSensorSource, SensorAdapter, SensorReading, SensorSource, TcpSensorConfig,
    TcpSensorSource,
};
use advisor_lib::{
    CropPrediction, CropPredictor, FeatureVector, ModelHandle, ModelStore, Predictor,
    NUM_FEATURES,
};

use crate::output::{color_probability, print_json, print_table, print_warning, OutputFormat};
use crate::PredictArgs;

/// Row for the ranked probability table
#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Crop")]
    crop: String,
    #[tabled(rename = "Probability")]
    probability: String,
}

#[derive(Serialize)]
struct PredictOutput<'a> {
    features: &'a FeatureVector,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
    prediction: &'a CropPrediction,
    low_confidence: bool,
}

pub fn run(args: PredictArgs, model_path: &Path, format: OutputFormat) -> Result<()> {
    let predictor = CropPredictor::new();
    predictor
        .load_from(&ModelStore::default(), &ModelHandle::new(model_path))
        .with_context(|| {
            format!(
                "Failed to load model {} (run `crop train` first)",
                model_path.display()
            )
        })?;

    let (reading, source) = read_features(&args)?;
    let prediction = predictor.predict_crop(reading.features())?;
    let formatter = PredictionFormatter::with_config(OutputConfig {
        max_alternatives: args.top,
        ..Default::default()
    });

    match format {
        OutputFormat::Json => print_json(&PredictOutput {
            features: reading.features(),
            source,
            fallback_reason: reading.fallback_reason().map(|r| r.to_string()),
            prediction: &prediction,
            low_confidence: formatter.is_low_confidence(&prediction),
        })?,
        OutputFormat::Table => {
            if let Some(reason) = reading.fallback_reason() {
                print_warning(&format!("{}; using default values", reason));
            }
            println!(
                "{} {}",
                "Predicted crop:".bold(),
                prediction.label.green().bold()
            );
            let rows: Vec<RankRow> = formatter
                .top_n(&prediction)
                .into_iter()
                .enumerate()
                .map(|(i, (crop, p))| RankRow {
                    rank: i + 1,
                    crop: crop.to_string(),
                    probability: color_probability(p),
                })
                .collect();
            print_table(&rows);
            if let Some(reason) = formatter.low_confidence_reason(&prediction) {
                print_warning(&format!("Low confidence: {}", reason));
            }
            println!("Model: {}", prediction.model_version.dimmed());
        }
    }

    Ok(())
}

fn read_features(args: &PredictArgs) -> Result<(SensorReading, &'static str)> {
    if let Some(values) = &args.features {
        if values.len() != NUM_FEATURES {
            bail!(
                "--features needs {} values (N,P,K,temperature,humidity,ph,rainfall), got {}",
                NUM_FEATURES,
                values.len()
            );
        }
        let mut array = [0.0; NUM_FEATURES];
        array.copy_from_slice(values);
        let features = FeatureVector::from_array(array);
        if !features.is_finite() {
            bail!("--features values must be finite");
        }
        return Ok((SensorReading::Live(features), "arguments"));
    }

    let (source, name): (Box<dyn SensorSource>, &'static str) = match (&args.sensor, args.stdin) {
        (Some(addr), _) => (
            Box::new(TcpSensorSource::new(
                TcpSensorConfig::new(addr.clone())
                    .with_timeout(Duration::from_millis(args.timeout_ms)),
            )),
            "sensor",
        ),
        (None, true) => (
            Box::new(ReaderSensorSource::new(BufReader::new(io::stdin()), "stdin")),
            "stdin",
        ),
        (None, false) => (Box::new(NoSensor), "default"),
    };
    Ok((SensorAdapter::new(source).read(), name))
}
