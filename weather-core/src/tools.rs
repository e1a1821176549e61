//! Text rendering for the three weather tools.
//!
//! Each tool makes one client call and formats the result for a human
//! reader. Upstream failures come back as a fixed message, never as an error.

use std::{fmt::Display, sync::Arc};

use tracing::info;

use crate::{
    model::{ForecastEntry, Location},
    provider::WeatherDataClient,
};

const NOT_AVAILABLE: &str = "N/A";

/// Entries with a precipitation probability above this are reported as alerts.
const ALERT_POP_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct WeatherTools {
    client: Arc<dyn WeatherDataClient>,
}

impl WeatherTools {
    pub fn new(client: Arc<dyn WeatherDataClient>) -> Self {
        Self { client }
    }

    /// Current conditions for `city`.
    pub async fn get_current_weather(&self, city: &str, country_code: Option<&str>) -> String {
        info!(city, country_code, "Tool called: get_current_weather");

        let Some(current) = self.client.current_weather(&location(city, country_code)).await else {
            return "Failed to fetch weather data.".to_string();
        };

        format!(
            "Current weather in {city}: {}, Temperature: {}°C, Humidity: {}%",
            or_na(current.description()),
            or_na(current.temp()),
            or_na(current.humidity()),
        )
    }

    /// One line per 3-hour forecast step.
    pub async fn get_weather_forecast(&self, city: &str, country_code: Option<&str>) -> String {
        info!(city, country_code, "Tool called: get_weather_forecast");

        let Some(forecast) = self.client.forecast(&location(city, country_code)).await else {
            return "Failed to fetch weather forecast.".to_string();
        };

        let mut lines = vec![format!("3-day weather forecast for {city}:")];
        lines.extend(forecast.list.iter().flatten().map(|entry| {
            format!(
                "- {}: {}, {}°C",
                or_na(entry.dt_txt.as_deref()),
                or_na(entry.description()),
                or_na(entry.temp()),
            )
        }));

        lines.join("\n")
    }

    /// Simulated alerts: hourly steps with a high chance of precipitation.
    pub async fn get_weather_alerts(&self, city: &str, country_code: Option<&str>) -> String {
        info!(city, country_code, "Tool called: get_weather_alerts");

        let Some(hourly) = self.client.alerts(&location(city, country_code)).await else {
            return "Failed to fetch weather alerts.".to_string();
        };

        let entries = hourly.list.unwrap_or_default();
        if entries.is_empty() {
            return format!("No active weather alerts for {city}.");
        }

        let alerts: Vec<String> = entries.iter().filter_map(alert_line).collect();
        if alerts.is_empty() {
            return format!("No significant weather alerts for {city} in the next 24 hours.");
        }

        let mut lines = vec![format!("Simulated weather alerts for {city}:")];
        lines.extend(alerts);
        lines.join("\n")
    }
}

fn location(city: &str, country_code: Option<&str>) -> Location {
    Location::new(city, country_code.map(str::to_owned))
}

fn alert_line(entry: &ForecastEntry) -> Option<String> {
    let pop = entry.pop.filter(|pop| *pop > ALERT_POP_THRESHOLD)?;

    // Drop the float noise the scaling adds (0.58 * 100 = 57.99999999999999).
    let percent = (pop * 100.0 * 1e9).round() / 1e9;

    Some(format!(
        "- {}: High probability of precipitation ({percent}%) - {}",
        or_na(entry.dt_txt.as_deref()),
        or_na(entry.description()),
    ))
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}
