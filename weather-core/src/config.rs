use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Environment variable holding the OpenWeather API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Startup failures. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENWEATHER_API_KEY environment variable not set.")]
    MissingApiKey,

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Process configuration, read once at startup.
///
/// Example TOML (the API key is never stored on disk):
/// ```toml
/// base_url = "https://api.openweathermap.org"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub api_key: String,

    /// Provider host, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single upstream request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Build a config with defaults and the given key, rejecting a blank key.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::default().api_key_checked(Some(api_key.into()))
    }

    /// Defaults plus the API key taken from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().api_key_checked(lookup(API_KEY_ENV))
    }

    /// Load settings and take the API key from the environment.
    ///
    /// An explicit `path` must exist. Without one, `config.toml` in the platform
    /// config directory is used when present, and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::read_file(path)?,
            None => match Self::config_file_path() {
                Ok(path) if path.exists() => Self::read_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.api_key_checked(std::env::var(API_KEY_ENV).ok())
    }

    /// Settings from a TOML file. The key is left empty.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-mcp")
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn api_key_checked(mut self, api_key: Option<String>) -> Result<Self, ConfigError> {
        match api_key {
            Some(key) if !key.trim().is_empty() => {
                self.api_key = key.trim().to_string();
                Ok(self)
            }
            _ => Err(ConfigError::MissingApiKey),
        }
    }

    /// `base_url` without a trailing slash, ready for path concatenation.
    pub fn host(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_fatal() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn blank_api_key_is_fatal() {
        let err = Config::from_lookup(|_| Some("   ".into())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn api_key_is_read_from_lookup() {
        let cfg = Config::from_lookup(|name| (name == API_KEY_ENV).then(|| "KEY".to_string()))
            .expect("key present");

        assert_eq!(cfg.api_key, "KEY");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn parse_fills_missing_settings_with_defaults() {
        let cfg = Config::parse("timeout_secs = 5\n").expect("valid toml");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert!(cfg.api_key.is_empty());
    }

    #[test]
    fn api_key_in_file_is_ignored() {
        let cfg = Config::parse("api_key = \"leaked\"\nbase_url = \"http://localhost:8080/\"\n")
            .expect("valid toml");
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.host(), "http://localhost:8080");
    }

    #[test]
    fn serialized_config_omits_api_key() {
        let cfg = Config::with_api_key("SECRET").expect("key present");
        let toml = toml::to_string_pretty(&cfg).expect("serializable");
        assert!(!toml.contains("SECRET"));
        assert!(toml.contains("timeout_secs"));
    }

    #[test]
    fn read_file_missing_path_is_an_error() {
        let err = Config::read_file(Path::new("/definitely/not/here/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn read_file_reports_parse_errors_with_path() {
        let dir = std::env::temp_dir().join(format!("weather-mcp-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("bad.toml");
        fs::write(&path, "timeout_secs = \"soon\"").expect("write temp file");

        let err = Config::read_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));

        let _ = fs::remove_dir_all(&dir);
    }
}
