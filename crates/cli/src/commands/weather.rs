//! `crop weather`

use anyhow::{Context, Result};
use colored::Colorize;

use advisor_lib::weather::{WeatherClient, WeatherConfig, WeatherError, WeatherService};

use crate::config::Config;
use crate::output::{print_json, print_warning, OutputFormat};
use crate::WeatherArgs;

pub async fn run(args: WeatherArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let city = args
        .city
        .or_else(|| config.city.clone())
        .context("No city given and none configured")?;

    let client = WeatherClient::new(WeatherConfig {
        api_key: args.api_key,
        base_url: args.base_url,
        geocoding_url: args.geocoding_url,
    })?;

    let report = match client.weather_for_city(&city).await {
        Ok(report) => report,
        Err(WeatherError::NotFound(city)) => {
            print_warning(&format!("City '{}' not found", city));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!(
                "{}",
                format!("Weather in {}, {}", report.location.name, report.location.country).bold()
            );
            println!("{}", "=".repeat(50));
            println!(
                "Coordinates:            {:.4}, {:.4}",
                report.location.lat, report.location.lon
            );
            println!("Temperature:            {:.1}°C", report.weather.temperature);
            println!("Humidity:               {:.0}%", report.weather.humidity);
            println!(
                "Rainfall (last hour):   {} mm",
                format!("{:.1}", report.weather.rainfall_1h).cyan()
            );
        }
    }

    Ok(())
}
