use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use weather_core::{Config, WeatherTools, client_from_config};

use crate::server::WeatherServer;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-mcp", version, about = "OpenWeather tools over MCP stdio")]
pub struct Cli {
    /// Settings file; defaults to config.toml in the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "weather_core=trace". Falls back to RUST_LOG, then "info".
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the weather tools over stdio (default).
    Serve,

    /// Print current conditions for a city.
    Current(LocationArgs),

    /// Print the 3-hour-step forecast for a city.
    Forecast(LocationArgs),

    /// Print simulated precipitation alerts for a city.
    Alerts(LocationArgs),
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// City name.
    pub city: String,

    /// Optional country code, e.g. "GB".
    #[arg(long)]
    pub country: Option<String>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let tools = WeatherTools::new(client_from_config(&config)?);

        let text = match self.command.unwrap_or(Command::Serve) {
            Command::Serve => {
                return Arc::new(WeatherServer::new(tools)).run_stdio().await;
            }
            Command::Current(args) => {
                tools.get_current_weather(&args.city, args.country.as_deref()).await
            }
            Command::Forecast(args) => {
                tools.get_weather_forecast(&args.city, args.country.as_deref()).await
            }
            Command::Alerts(args) => {
                tools.get_weather_alerts(&args.city, args.country.as_deref()).await
            }
        };

        println!("{text}");
        Ok(())
    }
}
