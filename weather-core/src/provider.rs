use crate::{
    Config, ConfigError,
    model::{CurrentWeather, Forecast, Location},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Upstream weather data source.
///
/// Every method yields `None` when the upstream call failed for any reason;
/// implementations log the cause and never surface it.
#[async_trait]
pub trait WeatherDataClient: Send + Sync + Debug {
    async fn current_weather(&self, location: &Location) -> Option<CurrentWeather>;

    /// A 24-entry, 3-hour-step forecast.
    async fn forecast(&self, location: &Location) -> Option<Forecast>;

    /// Hourly forecast for the geocoded location, used as the alert feed.
    async fn alerts(&self, location: &Location) -> Option<Forecast>;
}

/// Construct the OpenWeather client from config.
pub fn client_from_config(config: &Config) -> Result<Arc<dyn WeatherDataClient>, ConfigError> {
    Ok(Arc::new(OpenWeatherClient::new(config)?))
}
