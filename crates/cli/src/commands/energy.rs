//! `crop energy`

use anyhow::Result;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tabled::Tabled;

use advisor_lib::energy::{EnergyEstimator, EnergyTable};

use crate::output::{format_kwh, print_json, print_table, OutputFormat};
use crate::EnergyArgs;

/// Row for the crop table
#[derive(Tabled, Serialize)]
struct CropRow {
    #[tabled(rename = "Crop")]
    crop: String,
    #[tabled(rename = "kWh/day")]
    kwh_per_day: f64,
    #[tabled(rename = "Duration (days)")]
    duration_days: u32,
}

pub fn run(args: EnergyArgs, format: OutputFormat) -> Result<()> {
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut estimator = EnergyEstimator::new(EnergyTable::default(), rng);

    let crop = match args.crop {
        Some(crop) if !args.list => crop,
        _ => return list_crops(&estimator, format),
    };

    let days = args.days.unwrap_or_else(|| estimator.crop_duration(&crop));
    let estimate = estimator.estimate(&crop, days)?;

    match format {
        OutputFormat::Json => print_json(&estimate)?,
        OutputFormat::Table => {
            println!("{}", format!("Energy estimate for {}", estimate.crop).bold());
            println!("{}", "=".repeat(50));
            println!("Growing days:           {}", estimate.days);
            println!("Average use:            {:.1} kWh/day", estimate.kwh_per_day);
            println!(
                "Estimated total:        {}",
                format_kwh(estimate.total_kwh).green().bold()
            );
        }
    }
    Ok(())
}

fn list_crops(estimator: &EnergyEstimator, format: OutputFormat) -> Result<()> {
    let table = estimator.table();
    let rows: Vec<CropRow> = table
        .crops()
        .map(|crop| CropRow {
            crop: crop.to_string(),
            kwh_per_day: table.kwh_per_day[crop],
            duration_days: estimator.crop_duration(crop),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(&rows),
    }
    Ok(())
}
