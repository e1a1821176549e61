use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

/// City plus an optional country code, as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub city: String,
    pub country_code: Option<String>,
}

impl Location {
    pub fn new(city: impl Into<String>, country_code: Option<String>) -> Self {
        Self { city: city.into(), country_code }
    }

    /// Upstream `q` value: `"city,cc"` when a non-blank country code is given, else `"city"`.
    pub fn query(&self) -> String {
        match self.country_code.as_deref().map(str::trim) {
            Some(cc) if !cc.is_empty() => format!("{},{}", self.city, cc),
            _ => self.city.clone(),
        }
    }

    /// [`Location::query`], percent-encoded for embedding in a URL.
    pub fn encoded_query(&self) -> String {
        urlencoding::encode(&self.query()).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One hit from `/geo/1.0/direct`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GeocodeHit {
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lon: Option<f64>,
}

impl GeocodeHit {
    pub(crate) fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint { lat: self.lat?, lon: self.lon? })
    }
}

// Upstream bodies are read path by path: a value of the wrong type reads as
// absent instead of failing the whole document.

/// Decode `T`, or `None` when the value has another shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A string or number as display text, keeping the upstream number form.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// An array whose elements decode one by one; an element of another shape reads as all-absent.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };

    Ok(Some(
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
    ))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Condition {
    #[serde(default, deserialize_with = "scalar_text")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Readings {
    #[serde(default, deserialize_with = "scalar_text")]
    pub temp: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub humidity: Option<String>,
}

/// Body of `/data/2.5/weather`. Only the fields the tools read are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentWeather {
    #[serde(default, deserialize_with = "lenient_list")]
    pub weather: Option<Vec<Condition>>,
    #[serde(default, deserialize_with = "lenient")]
    pub main: Option<Readings>,
}

impl CurrentWeather {
    pub fn description(&self) -> Option<&str> {
        first_description(self.weather.as_deref())
    }

    pub fn temp(&self) -> Option<&str> {
        self.main.as_ref()?.temp.as_deref()
    }

    pub fn humidity(&self) -> Option<&str> {
        self.main.as_ref()?.humidity.as_deref()
    }
}

/// Body of `/data/2.5/forecast` and `/data/2.5/forecast/hourly`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Forecast {
    #[serde(default, deserialize_with = "lenient_list")]
    pub list: Option<Vec<ForecastEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastEntry {
    #[serde(default, deserialize_with = "scalar_text")]
    pub dt_txt: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub weather: Option<Vec<Condition>>,
    #[serde(default, deserialize_with = "lenient")]
    pub main: Option<Readings>,
    /// Probability of precipitation, 0..=1.
    #[serde(default, deserialize_with = "lenient")]
    pub pop: Option<f64>,
}

impl ForecastEntry {
    pub fn description(&self) -> Option<&str> {
        first_description(self.weather.as_deref())
    }

    pub fn temp(&self) -> Option<&str> {
        self.main.as_ref()?.temp.as_deref()
    }
}

fn first_description(weather: Option<&[Condition]>) -> Option<&str> {
    weather?.first()?.description.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_without_country_is_city() {
        let loc = Location::new("London", None);
        assert_eq!(loc.query(), "London");
        assert_eq!(loc.encoded_query(), "London");
    }

    #[test]
    fn query_with_country_joins_with_comma() {
        let loc = Location::new("London", Some("GB".into()));
        assert_eq!(loc.query(), "London,GB");
        assert_eq!(loc.encoded_query(), "London%2CGB");
    }

    #[test]
    fn blank_country_code_is_ignored() {
        let loc = Location::new("Paris", Some("  ".into()));
        assert_eq!(loc.query(), "Paris");
    }

    #[test]
    fn encoded_query_escapes_spaces_and_unicode() {
        let loc = Location::new("New York", Some("US".into()));
        assert_eq!(loc.encoded_query(), "New%20York%2CUS");

        let loc = Location::new("Zürich", None);
        assert_eq!(loc.encoded_query(), "Z%C3%BCrich");
    }

    #[test]
    fn empty_object_decodes_to_all_absent() {
        let current: CurrentWeather = serde_json::from_str("{}").expect("valid json");
        assert!(current.description().is_none());
        assert!(current.temp().is_none());
        assert!(current.humidity().is_none());
    }

    #[test]
    fn current_weather_keeps_number_representation() {
        let current: CurrentWeather = serde_json::from_str(
            r#"{"weather":[{"description":"clear sky"}],"main":{"temp":15,"humidity":60.5}}"#,
        )
        .expect("valid json");

        assert_eq!(current.description(), Some("clear sky"));
        assert_eq!(current.temp(), Some("15"));
        assert_eq!(current.humidity(), Some("60.5"));
    }

    #[test]
    fn null_and_empty_weather_arrays_have_no_description() {
        let current: CurrentWeather =
            serde_json::from_str(r#"{"weather":null}"#).expect("valid json");
        assert!(current.description().is_none());

        let entry: ForecastEntry = serde_json::from_str(r#"{"weather":[]}"#).expect("valid json");
        assert!(entry.description().is_none());
    }

    #[test]
    fn geocode_hit_requires_both_coordinates() {
        let hit: GeocodeHit = serde_json::from_str(r#"{"lat":51.5}"#).expect("valid json");
        assert!(hit.point().is_none());

        let hit: GeocodeHit =
            serde_json::from_str(r#"{"lat":51.5073219,"lon":-0.1276474}"#).expect("valid json");
        assert_eq!(hit.point(), Some(GeoPoint { lat: 51.5073219, lon: -0.1276474 }));
    }

    #[test]
    fn wrong_leaf_types_read_as_absent_or_text() {
        let current: CurrentWeather = serde_json::from_str(
            r#"{"weather":[{"description":42}],"main":{"temp":{"c":1},"humidity":"60"}}"#,
        )
        .expect("valid json");

        assert_eq!(current.description(), Some("42"));
        assert!(current.temp().is_none());
        assert_eq!(current.humidity(), Some("60"));
    }

    #[test]
    fn wrong_container_types_read_as_absent() {
        let current: CurrentWeather =
            serde_json::from_str(r#"{"weather":"sunny","main":[1,2]}"#).expect("valid json");
        assert!(current.description().is_none());
        assert!(current.temp().is_none());

        let forecast: Forecast = serde_json::from_str(r#"{"list":"none"}"#).expect("valid json");
        assert!(forecast.list.is_none());
    }

    #[test]
    fn odd_list_entries_keep_their_place() {
        let forecast: Forecast = serde_json::from_str(
            r#"{"list":[7,{"dt_txt":"2024-01-15 12:00:00","pop":"high"}]}"#,
        )
        .expect("valid json");

        let list = forecast.list.expect("list present");
        assert_eq!(list.len(), 2);
        assert!(list[0].dt_txt.is_none());
        assert_eq!(list[1].dt_txt.as_deref(), Some("2024-01-15 12:00:00"));
        assert!(list[1].pop.is_none());
    }

    #[test]
    fn geocode_hit_with_string_coordinates_has_no_point() {
        let hit: GeocodeHit =
            serde_json::from_str(r#"{"lat":"51.5","lon":-0.12}"#).expect("valid json");
        assert!(hit.point().is_none());
    }
}
