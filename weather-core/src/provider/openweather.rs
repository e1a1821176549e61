use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::{
    Config, ConfigError,
    model::{CurrentWeather, Forecast, GeocodeHit, Location},
};

use super::WeatherDataClient;

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const GEOCODE_PATH: &str = "/geo/1.0/direct";
const HOURLY_PATH: &str = "/data/2.5/forecast/hourly";

/// Entries requested from the forecast endpoints.
const FORECAST_COUNT: u32 = 24;

/// Why a single upstream request produced no data. Never leaves this module.
#[derive(Debug, Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // The URL carries the API key.
        FetchError::Transport(err.without_url())
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    host: String,
    http: Client,
}

impl OpenWeatherClient {
    /// Build a client with its own pooled transport, bounded by `config.timeout_secs`.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Self::with_http(http, config)
    }

    /// Build a client on top of an existing transport.
    pub fn with_http(http: Client, config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            api_key: api_key.to_string(),
            host: config.host().to_string(),
            http,
        })
    }

    /// GET `path?query` and decode the body, logging and swallowing any failure.
    async fn get<T: DeserializeOwned + Default>(&self, path: &str, query: &str) -> Option<T> {
        match self.fetch(path, query).await {
            Ok(body) => Some(body),
            Err(err) => {
                error!(path, query, error = %err, "OpenWeather request failed");
                None
            }
        }
    }

    /// Only a body that is not JSON at all is an error; any other shape reads as all-absent.
    async fn fetch<T>(&self, path: &str, query: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Default,
    {
        debug!(path, query, "Fetching OpenWeather endpoint");

        let url = format!("{}{}?{}&appid={}", self.host, path, query, self.api_key);
        let res = self.http.get(&url).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(path, error = %err, "Unexpected OpenWeather response shape");
            T::default()
        }))
    }
}

#[async_trait]
impl WeatherDataClient for OpenWeatherClient {
    #[instrument(skip_all, fields(q = %location.query()))]
    async fn current_weather(&self, location: &Location) -> Option<CurrentWeather> {
        let query = format!("q={}&units=metric", location.encoded_query());
        self.get(CURRENT_PATH, &query).await
    }

    #[instrument(skip_all, fields(q = %location.query()))]
    async fn forecast(&self, location: &Location) -> Option<Forecast> {
        let query = format!(
            "q={}&units=metric&cnt={FORECAST_COUNT}",
            location.encoded_query()
        );
        self.get(FORECAST_PATH, &query).await
    }

    #[instrument(skip_all, fields(q = %location.query()))]
    async fn alerts(&self, location: &Location) -> Option<Forecast> {
        let geo_query = format!("q={}&limit=1", location.encoded_query());
        let hits: Vec<GeocodeHit> = self.get(GEOCODE_PATH, &geo_query).await?;

        let Some(point) = hits.first().and_then(GeocodeHit::point) else {
            warn!("Geocoding returned no usable coordinates");
            return None;
        };

        let query = format!(
            "lat={}&lon={}&units=metric&cnt={FORECAST_COUNT}",
            point.lat, point.lon
        );
        self.get(HOURLY_PATH, &query).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_http_rejects_blank_key() {
        let cfg = Config {
            api_key: "  ".into(),
            ..Config::default()
        };
        let err = OpenWeatherClient::with_http(Client::new(), &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn host_has_no_trailing_slash() {
        let cfg = Config {
            api_key: "KEY".into(),
            base_url: "http://127.0.0.1:9999/".into(),
            ..Config::default()
        };
        let client = OpenWeatherClient::new(&cfg).expect("client builds");
        assert_eq!(client.host, "http://127.0.0.1:9999");
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("not found"), "not found");
    }

    #[test]
    fn truncate_body_cuts_on_char_boundary() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn status_error_does_not_mention_key() {
        let err = FetchError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "{\"cod\":401}".into(),
        };
        assert_eq!(err.to_string(), "status 401 Unauthorized: {\"cod\":401}");
    }
}
