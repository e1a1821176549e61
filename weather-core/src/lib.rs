//! Core library for the weather MCP server.
//!
//! This crate defines:
//! - Configuration (API key from the environment, optional settings file)
//! - The `WeatherDataClient` abstraction and its OpenWeather implementation
//! - Partial response models and the text rendering for each tool
//!
//! It is used by `weather-mcp`, but the tools can be hosted by any other transport.

pub mod config;
pub mod model;
pub mod provider;
pub mod tools;

pub use config::{API_KEY_ENV, Config, ConfigError};
pub use model::{CurrentWeather, Forecast, ForecastEntry, GeoPoint, Location};
pub use provider::{WeatherDataClient, client_from_config, openweather::OpenWeatherClient};
pub use tools::WeatherTools;
