use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::error::ConfigError;

/// Timezone value meaning "whatever zone the host is configured for".
pub const LOCAL_TIMEZONE: &str = "local";

/// Renders dates like `1/1/2024`.
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_FIREBASE_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Summarize all errors on one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather API settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// How forecast samples are grouped into days
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Identity provider and document store settings
    #[serde(default)]
    pub firebase: FirebaseConfig,

    /// Backoff for transient HTTP failures
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Unit system passed through to the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
    Standard,
}

impl UnitSystem {
    /// Value of the `units` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Imperial => "imperial",
            Self::Metric => "metric",
            Self::Standard => "standard",
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Self::Imperial => "°F",
            Self::Metric => "°C",
            Self::Standard => "K",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imperial" => Ok(Self::Imperial),
            "metric" => Ok(Self::Metric),
            "standard" => Ok(Self::Standard),
            other => Err(ConfigError::Invalid(format!("unknown unit system: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (or `OPENWEATHER_API_KEY`)
    pub api_key: String,

    pub base_url: String,

    pub units: UnitSystem,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl WeatherConfig {
    /// Check if an API key is configured (not a placeholder)
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: "YOUR_OPENWEATHER_API_KEY".to_string(),
            base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            units: UnitSystem::Imperial,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// `local` or an IANA zone name such as `America/Denver`
    pub timezone: String,

    /// chrono strftime pattern used to render (and group by) the day
    pub date_format: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            timezone: LOCAL_TIMEZONE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl ForecastConfig {
    /// Parse the configured zone. `None` means the host's local zone.
    pub fn named_zone(&self) -> Result<Option<chrono_tz::Tz>, ConfigError> {
        let name = self.timezone.trim();
        if name.eq_ignore_ascii_case(LOCAL_TIMEZONE) {
            return Ok(None);
        }
        name.parse::<chrono_tz::Tz>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone: {}", name)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Web API key (or `FIREBASE_API_KEY`)
    pub api_key: String,

    /// Identity Toolkit base URL
    pub auth_url: String,

    /// Realtime Database URL (or `FIREBASE_DATABASE_URL`)
    pub database_url: String,
}

impl FirebaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
            && !self.api_key.starts_with("YOUR_")
            && !self.database_url.is_empty()
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: "YOUR_FIREBASE_API_KEY".to_string(),
            auth_url: DEFAULT_FIREBASE_AUTH_URL.to_string(),
            database_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load from `path` (or the default location), apply environment
    /// overrides and validate.
    ///
    /// Only the default location is created when missing; an explicit
    /// `path` must exist. Returns an error if validation fails with critical
    /// errors; warnings are logged.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let mut config = match path {
            Some(p) if !p.exists() => {
                return Err(ConfigError::NotFound(p.display().to_string()).into());
            }
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();

        let validation = config.validate();
        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Secrets may come from the environment instead of the config file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENWEATHER_API_KEY") {
            self.weather.api_key = key;
        }
        if let Some(key) = non_empty("FIREBASE_API_KEY") {
            self.firebase.api_key = key;
        }
        if let Some(url) = non_empty("FIREBASE_DATABASE_URL") {
            self.firebase.database_url = url;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        self.validate_url(&self.firebase.auth_url, "firebase.auth_url", &mut result);

        if self.firebase.database_url.is_empty() {
            result.add_warning(
                "firebase.database_url",
                "Database URL not set - saved cities will be unavailable",
            );
        } else {
            self.validate_url(
                &self.firebase.database_url,
                "firebase.database_url",
                &mut result,
            );
        }

        if !self.weather.is_configured() {
            result.add_warning("weather.api_key", "Weather API key not configured");
        }
        if self.firebase.api_key.is_empty() || self.firebase.api_key.starts_with("YOUR_") {
            result.add_warning("firebase.api_key", "Firebase API key not configured");
        }

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        } else if self.weather.timeout_secs > 120 {
            result.add_warning("weather.timeout_secs", "Timeout is unusually long (>120s)");
        }

        if let Err(e) = self.forecast.named_zone() {
            result.add_error("forecast.timezone", e.to_string());
        }

        if self.forecast.date_format.trim().is_empty() {
            result.add_error("forecast.date_format", "Date format must not be empty");
        } else if StrftimeItems::new(&self.forecast.date_format).any(|i| matches!(i, Item::Error))
        {
            result.add_error(
                "forecast.date_format",
                format!("Invalid date format: {}", self.forecast.date_format),
            );
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            result.add_warning(
                "retry.max_delay_ms",
                "Maximum delay is below the initial delay; every retry waits the maximum",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("plantcast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_unconfigured_keys_are_warnings() {
        let result = Config::default().validate();
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
        assert!(result.warnings.iter().any(|w| w.field == "firebase.api_key"));
        assert!(result.warnings.iter().any(|w| w.field == "firebase.database_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.base_url = "ftp://api.openweathermap.org".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_database_url() {
        let mut config = Config::default();
        config.firebase.database_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "firebase.database_url"));
    }

    #[test]
    fn test_unknown_timezone_is_error() {
        let mut config = Config::default();
        config.forecast.timezone = "Mars/Olympus_Mons".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "forecast.timezone"));
    }

    #[test]
    fn test_named_zone_parsing() {
        let mut forecast = ForecastConfig::default();
        assert!(forecast.named_zone().unwrap().is_none());

        forecast.timezone = "America/Denver".to_string();
        assert_eq!(forecast.named_zone().unwrap(), Some(chrono_tz::America::Denver));
    }

    #[test]
    fn test_invalid_date_format_is_error() {
        let mut config = Config::default();
        config.forecast.date_format = "%Q".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "forecast.date_format"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.weather.timeout_secs = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENWEATHER_API_KEY", "owm-key"),
            ("FIREBASE_API_KEY", ""),
            ("FIREBASE_DATABASE_URL", "https://demo.firebaseio.com"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.weather.api_key, "owm-key");
        // Empty values don't clobber the file's setting
        assert_eq!(config.firebase.api_key, "YOUR_FIREBASE_API_KEY");
        assert_eq!(config.firebase.database_url, "https://demo.firebaseio.com");
    }

    #[test]
    fn test_unit_system_from_str() {
        assert_eq!("Metric".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert_eq!(UnitSystem::Imperial.as_query(), "imperial");
        assert!("kelvinish".parse::<UnitSystem>().is_err());
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.forecast.date_format, DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn test_load_from_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[weather]\napi_key = \"abc\"\nbase_url = \"https://example.com\"\nunits = \"metric\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.units, UnitSystem::Metric);
        assert_eq!(config.forecast.timezone, LOCAL_TIMEZONE);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_partial_sections_fill_missing_fields() {
        let config: Config = toml::from_str("[weather]\napi_key = \"abc\"\n").unwrap();
        assert_eq!(config.weather.api_key, "abc");
        assert_eq!(config.weather.base_url, DEFAULT_WEATHER_BASE_URL);
        assert_eq!(config.weather.units, UnitSystem::Imperial);
        assert_eq!(config.weather.timeout_secs, 10);

        let config: Config =
            toml::from_str("[firebase]\napi_key = \"fb\"\n\n[forecast]\ntimezone = \"UTC\"\n\n[retry]\nmax_retries = 1\n")
                .unwrap();
        assert_eq!(config.firebase.auth_url, DEFAULT_FIREBASE_AUTH_URL);
        assert!(config.firebase.database_url.is_empty());
        assert_eq!(config.forecast.timezone, "UTC");
        assert_eq!(config.forecast.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.max_delay_ms, 5000);
    }

    #[test]
    fn test_load_from_file_with_only_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather]\napi_key = \"abc\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.weather.is_configured());
        assert_eq!(config.weather.base_url, DEFAULT_WEATHER_BASE_URL);
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound(p)) if p.ends_with("nope.toml")
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_from_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
