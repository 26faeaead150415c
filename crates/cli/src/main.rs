//! Crop Advisor CLI
//!
//! A command-line tool for training crop models, requesting
//! recommendations and running the weather and energy utilities.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{energy, model, predict, train, weather};
use std::path::PathBuf;
use tracing::debug;

/// Crop Advisor CLI
#[derive(Parser)]
#[command(name = "crop")]
#[command(author, version, about = "CLI for the Crop Advisor", long_about = None)]
pub struct Cli {
    /// Model file (falls back to the config file, then crop_predictor.model)
    #[arg(long, global = true, env = "CROP_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a labeled CSV and save it
    Train(TrainArgs),

    /// Recommend a crop for one set of measurements
    Predict(PredictArgs),

    /// Inspect the saved model
    #[command(subcommand)]
    Model(ModelCommands),

    /// Show current weather for a city
    Weather(WeatherArgs),

    /// Estimate energy use for growing a crop
    Energy(EnergyArgs),
}

#[derive(Args)]
pub struct TrainArgs {
    /// Labeled dataset (N,P,K,temperature,humidity,ph,rainfall,label)
    #[arg(long, short)]
    pub dataset: Option<PathBuf>,

    /// Number of trees in the forest
    #[arg(long, default_value_t = advisor_lib::predictor::DEFAULT_N_TREES)]
    pub trees: usize,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Seed for the split and the forest
    #[arg(long, default_value_t = advisor_lib::training::DEFAULT_SEED)]
    pub seed: u64,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value_t = advisor_lib::training::DEFAULT_TEST_FRACTION)]
    pub test_fraction: f64,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Seven comma-separated values: N,P,K,temperature,humidity,ph,rainfall
    #[arg(long, value_delimiter = ',', num_args = 1.., allow_hyphen_values = true,
          conflicts_with_all = ["sensor", "stdin"])]
    pub features: Option<Vec<f64>>,

    /// Read one line from a sensor bridge at host:port
    #[arg(long, conflicts_with = "stdin")]
    pub sensor: Option<String>,

    /// Sensor timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Read one line of sensor text from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Number of alternatives to list
    #[arg(long, default_value_t = 3)]
    pub top: usize,
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// Show metadata of the saved model
    Info,
}

#[derive(Args)]
pub struct WeatherArgs {
    /// City name (falls back to the config file)
    pub city: Option<String>,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, default_value = advisor_lib::weather::DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value = advisor_lib::weather::DEFAULT_GEOCODING_URL)]
    pub geocoding_url: String,
}

#[derive(Args)]
pub struct EnergyArgs {
    /// Crop label; omit with --list
    #[arg(required_unless_present = "list")]
    pub crop: Option<String>,

    /// Growing days (defaults to the crop's typical duration)
    #[arg(long)]
    pub days: Option<u32>,

    /// Seed for the estimate jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// List every crop in the table
    #[arg(long)]
    pub list: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter("debug")
            .init();
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let model_path = config.resolve_model_path(cli.model);
    debug!(model = %model_path.display(), "Resolved model path");

    match cli.command {
        Commands::Train(args) => train::run(args, &config, &model_path, cli.format)?,
        Commands::Predict(args) => predict::run(args, &model_path, cli.format)?,
        Commands::Model(ModelCommands::Info) => model::show_info(&model_path, cli.format)?,
        Commands::Weather(args) => weather::run(args, &config, cli.format).await?,
        Commands::Energy(args) => energy::run(args, cli.format)?,
    }

    Ok(())
}
