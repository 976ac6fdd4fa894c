use chrono::{DateTime, Utc};
use plantcast_core::error::{self as core_error, AppError, NetworkError, ReqwestErrorExt};
use serde::{Deserialize, Serialize};

pub use plantcast_core::UnitSystem;

/// One 3-hour forecast window as returned by the weather API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    pub min_temp: f64,
    pub max_temp: f64,
    /// Probability of precipitation, 0.0 to 1.0
    pub precipitation_probability: f64,
    pub icon: String,
}

/// Aggregated statistics for all samples sharing a calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Rendered date, also the grouping key
    pub calendar_date: String,
    pub sample_count: usize,
    /// Mean probability as a percentage, one decimal
    pub average_precipitation_percent: f64,
    /// Whole degrees
    pub min_temp: f64,
    /// Whole degrees
    pub max_temp: f64,
    /// Icon of the first sample seen for this date
    pub icon: String,
}

/// A plant and the rain chance (percent) at or above which it can skip watering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRainRule {
    pub name: String,
    pub rain_threshold_percent: f64,
}

impl PlantRainRule {
    pub fn new(name: impl Into<String>, rain_threshold_percent: f64) -> Self {
        Self {
            name: name.into(),
            rain_threshold_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringRecommendation {
    pub plant: String,
    pub needs_watering: bool,
}

/// One day of the forecast with its per-plant advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOutlook {
    pub summary: DailySummary,
    pub recommendations: Vec<WateringRecommendation>,
}

/// Result of a successful forecast fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// City name as resolved by the API
    pub city_name: Option<String>,
    pub samples: Vec<ForecastSample>,
    /// Entries dropped because they were missing required fields
    pub skipped: usize,
}

/// A forecast entry that cannot be turned into a [`ForecastSample`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedSampleError {
    #[error("sample is missing `{0}`")]
    MissingField(&'static str),
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
    /// A field has the wrong type (e.g. `"pop": "x"`)
    #[error("entry could not be decoded: {0}")]
    Undecodable(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Location not found: {0}")]
    LocationNotFound(String),
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Rate limited")]
    RateLimited,
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::Network(e) => AppError::Network(e.into_network_error()),
            WeatherError::LocationNotFound(city) => {
                AppError::Weather(core_error::WeatherError::LocationNotFound(city))
            }
            WeatherError::InvalidApiKey => AppError::Weather(core_error::WeatherError::InvalidApiKey),
            WeatherError::RateLimited => AppError::Weather(core_error::WeatherError::RateLimited),
            WeatherError::Api { status, .. } if status >= 500 => {
                AppError::Weather(core_error::WeatherError::ServiceUnavailable)
            }
            WeatherError::Api { status, message } => AppError::Weather(
                core_error::WeatherError::ApiError(format!("{}: {}", status, message)),
            ),
            WeatherError::Parse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
        }
    }
}
