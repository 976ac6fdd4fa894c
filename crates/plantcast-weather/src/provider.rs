//! OpenWeatherMap 5-day / 3-hour forecast client.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use plantcast_core::config::DEFAULT_WEATHER_BASE_URL;
use plantcast_core::{RetrySettings, WeatherConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::retry::{with_retry, RetryConfig};
use crate::types::{Forecast, ForecastSample, MalformedSampleError, UnitSystem, WeatherError};

const FORECAST_PATH: &str = "/data/2.5/forecast";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    /// Kept raw so each entry is decoded on its own
    list: Option<Vec<serde_json::Value>>,
    city: Option<CityInfo>,
}

#[derive(Debug, Deserialize)]
struct CityInfo {
    name: Option<String>,
}

/// One `list[]` entry. Every field is optional so a single bad entry can be
/// skipped instead of failing the whole response.
#[derive(Debug, Default, Deserialize)]
struct ForecastItem {
    dt: Option<i64>,
    main: Option<MainReadings>,
    pop: Option<f64>,
    weather: Option<Vec<Condition>>,
}

#[derive(Debug, Default, Deserialize)]
struct MainReadings {
    temp_min: Option<f64>,
    temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    icon: Option<String>,
}

/// Body of an OpenWeatherMap error response
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl TryFrom<ForecastItem> for ForecastSample {
    type Error = MalformedSampleError;

    fn try_from(item: ForecastItem) -> Result<Self, Self::Error> {
        let dt = item.dt.ok_or(MalformedSampleError::MissingField("dt"))?;
        let time =
            DateTime::from_timestamp(dt, 0).ok_or(MalformedSampleError::InvalidTimestamp(dt))?;
        let main = item.main.ok_or(MalformedSampleError::MissingField("main"))?;
        let min_temp = main
            .temp_min
            .ok_or(MalformedSampleError::MissingField("main.temp_min"))?;
        let max_temp = main
            .temp_max
            .ok_or(MalformedSampleError::MissingField("main.temp_max"))?;
        let precipitation_probability =
            item.pop.ok_or(MalformedSampleError::MissingField("pop"))?;
        let icon = item
            .weather
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.icon)
            .ok_or(MalformedSampleError::MissingField("weather[0].icon"))?;

        Ok(ForecastSample {
            time,
            min_temp,
            max_temp,
            precipitation_probability,
            icon,
        })
    }
}

fn decode_sample(raw: serde_json::Value) -> Result<ForecastSample, MalformedSampleError> {
    let item: ForecastItem = serde_json::from_value(raw)
        .map_err(|e| MalformedSampleError::Undecodable(e.to_string()))?;
    ForecastSample::try_from(item)
}

/// Convert raw entries, skipping (and logging) the malformed ones.
fn collect_samples(items: Vec<serde_json::Value>) -> (Vec<ForecastSample>, usize) {
    let mut samples = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for (index, raw) in items.into_iter().enumerate() {
        match decode_sample(raw) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                tracing::warn!("Skipping forecast entry {}: {}", index, e);
                skipped += 1;
            }
        }
    }

    (samples, skipped)
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    units: UnitSystem,
    retry: RetryConfig,
}

impl WeatherProvider {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, units: UnitSystem) -> Result<Self, WeatherError> {
        Self::with_timeout(api_key, units, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn with_timeout(
        api_key: impl Into<String>,
        units: UnitSystem,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.into(),
            base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            units,
            retry: RetryConfig::default(),
        })
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &WeatherConfig, retry: &RetrySettings) -> Result<Self, WeatherError> {
        Ok(Self::with_timeout(
            config.api_key.clone(),
            config.units,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_base_url(&config.base_url)
        .with_retry(retry.into()))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the 5-day / 3-hour forecast for `city`.
    ///
    /// # Errors
    /// `LocationNotFound` when the API can't resolve the city (or it is
    /// blank), `InvalidApiKey` on 401, `RateLimited` on 429 after retries,
    /// `Api` for other failures and `Parse` when the body has no `list`.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::LocationNotFound(String::new()));
        }

        let url = format!("{}{}", self.base_url, FORECAST_PATH);
        let params = [
            ("q", city),
            ("appid", self.api_key.as_str()),
            ("units", self.units.as_query()),
        ];

        let response = with_retry(&self.retry, || {
            self.client.get(&url).query(&params).send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_error(status, city, response).await);
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(format!("forecast body: {}", e)))?;

        let items = body
            .list
            .ok_or_else(|| WeatherError::Parse("response has no forecast list".to_string()))?;
        let (samples, skipped) = collect_samples(items);

        tracing::info!(
            "Fetched {} forecast samples for {} ({} skipped)",
            samples.len(),
            city,
            skipped
        );

        Ok(Forecast {
            city_name: body.city.and_then(|c| c.name),
            samples,
            skipped,
        })
    }

    async fn map_error(status: StatusCode, city: &str, response: reqwest::Response) -> WeatherError {
        match status {
            StatusCode::NOT_FOUND => WeatherError::LocationNotFound(city.to_string()),
            StatusCode::UNAUTHORIZED => WeatherError::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => WeatherError::RateLimited,
            _ => {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .ok()
                    .and_then(|b| b.message)
                    .unwrap_or(text);
                WeatherError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> ForecastItem {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_complete_item_converts() {
        let sample = ForecastSample::try_from(item(serde_json::json!({
            "dt": 1704067200,
            "main": {"temp": 50.0, "temp_min": 48.2, "temp_max": 51.9},
            "pop": 0.35,
            "weather": [{"id": 500, "icon": "10d"}, {"id": 701, "icon": "50d"}]
        })))
        .unwrap();

        assert_eq!(sample.time.timestamp(), 1_704_067_200);
        assert_eq!(sample.min_temp, 48.2);
        assert_eq!(sample.max_temp, 51.9);
        assert_eq!(sample.precipitation_probability, 0.35);
        assert_eq!(sample.icon, "10d");
    }

    #[test]
    fn test_missing_pop_is_malformed() {
        let err = ForecastSample::try_from(item(serde_json::json!({
            "dt": 1704067200,
            "main": {"temp_min": 48.2, "temp_max": 51.9},
            "weather": [{"icon": "10d"}]
        })))
        .unwrap_err();
        assert_eq!(err, MalformedSampleError::MissingField("pop"));
    }

    #[test]
    fn test_empty_weather_array_is_malformed() {
        let err = ForecastSample::try_from(item(serde_json::json!({
            "dt": 1704067200,
            "main": {"temp_min": 48.2, "temp_max": 51.9},
            "pop": 0.0,
            "weather": []
        })))
        .unwrap_err();
        assert_eq!(err, MalformedSampleError::MissingField("weather[0].icon"));
    }

    #[test]
    fn test_out_of_range_timestamp_is_malformed() {
        let err = ForecastSample::try_from(item(serde_json::json!({
            "dt": i64::MAX,
            "main": {"temp_min": 48.2, "temp_max": 51.9},
            "pop": 0.0,
            "weather": [{"icon": "10d"}]
        })))
        .unwrap_err();
        assert_eq!(err, MalformedSampleError::InvalidTimestamp(i64::MAX));
    }

    #[test]
    fn test_collect_samples_skips_bad_entries() {
        let items = vec![
            serde_json::json!({
                "dt": 1704067200,
                "main": {"temp_min": 1.0, "temp_max": 2.0},
                "pop": 0.1,
                "weather": [{"icon": "01d"}]
            }),
            serde_json::json!({}),
            serde_json::json!({"dt": 1704078000, "main": null, "pop": 0.1}),
            serde_json::json!({
                "dt": 1704078000,
                "main": {"temp_min": 1.0, "temp_max": 2.0},
                "pop": 0.1,
                "weather": null
            }),
            serde_json::json!({
                "dt": 1704078000,
                "main": {"temp_min": 1.0, "temp_max": 2.0},
                "pop": "x",
                "weather": [{"icon": "01d"}]
            }),
            serde_json::json!("not an object"),
        ];
        let (samples, skipped) = collect_samples(items);
        assert_eq!(samples.len(), 1);
        assert_eq!(skipped, 5);
    }

    #[test]
    fn test_wrong_typed_field_is_undecodable() {
        let err = decode_sample(serde_json::json!({
            "dt": 1704067200,
            "main": {"temp_min": "cold", "temp_max": 2.0},
            "pop": 0.1,
            "weather": [{"icon": "01d"}]
        }))
        .unwrap_err();
        assert!(matches!(err, MalformedSampleError::Undecodable(_)));
    }

    #[test]
    fn test_null_weather_is_missing_icon() {
        let err = decode_sample(serde_json::json!({
            "dt": 1704067200,
            "main": {"temp_min": 1.0, "temp_max": 2.0},
            "pop": 0.1,
            "weather": null
        }))
        .unwrap_err();
        assert_eq!(err, MalformedSampleError::MissingField("weather[0].icon"));
    }

    #[tokio::test]
    async fn test_blank_city_rejected_without_request() {
        let provider = WeatherProvider::new("key", UnitSystem::Imperial)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = provider.fetch_forecast("   ").await.unwrap_err();
        assert!(matches!(err, WeatherError::LocationNotFound(_)));
    }
}
