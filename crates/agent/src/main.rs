//! Crop advisor agent
//!
//! Loads or trains the model unit, reads the field sensor (falling back to
//! a default sample when it is unavailable) and prints a crop
//! recommendation. With a non-zero interval it keeps predicting until
//! interrupted.

use advisor_lib::observability::{AdvisorMetrics, StructuredLogger};
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod pipeline;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting crop-agent");

    let config = config::AgentConfig::load()?;
    info!(site = %config.site_name, model_path = %config.model_path.display(), "Agent configured");

    let metrics = AdvisorMetrics::new();
    let logger = StructuredLogger::new(&config.site_name);
    let interval_secs = config.interval_secs;

    let mut pipeline = pipeline::Pipeline::build(config, logger.clone(), metrics)?;
    logger.log_startup(AGENT_VERSION, &pipeline.model_version());

    if interval_secs == 0 {
        let report = pipeline.run_cycle().await?;
        print!("{}", report);
        logger.log_shutdown("single cycle complete");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match pipeline.run_cycle().await {
                    Ok(report) => print!("{}", report),
                    Err(e) => error!(error = %e, "Recommendation cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logger.log_shutdown("SIGINT received");
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
