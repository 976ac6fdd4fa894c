//! Integration tests for WeatherProvider against a mock OpenWeatherMap.

use plantcast_weather::{
    aggregate, default_plants, outlook, DateLabeler, RetryConfig, UnitSystem, WeatherError,
    WeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// 2024-01-01T00:00:00Z
const JAN_1: i64 = 1_704_067_200;

fn entry(dt: i64, min: f64, max: f64, pop: f64, icon: &str) -> serde_json::Value {
    serde_json::json!({
        "dt": dt,
        "main": {"temp": (min + max) / 2.0, "temp_min": min, "temp_max": max, "humidity": 60},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": icon}],
        "pop": pop,
        "dt_txt": "ignored"
    })
}

fn forecast_body(list: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "cod": "200",
        "message": 0,
        "cnt": list.len(),
        "list": list,
        "city": {"id": 5419384, "name": "Denver", "country": "US"}
    })
}

fn provider(server: &MockServer) -> WeatherProvider {
    WeatherProvider::new("test-key", UnitSystem::Imperial)
        .unwrap()
        .with_base_url(&server.uri())
        .with_retry(RetryConfig::new(2, 1, 5))
}

#[tokio::test]
async fn test_fetch_forecast_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("q", "Denver"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(vec![
            entry(JAN_1, 30.0, 41.0, 0.2, "01d"),
            entry(JAN_1 + 3 * 3600, 28.0, 45.0, 0.6, "10d"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let forecast = provider(&server).fetch_forecast("Denver").await.unwrap();

    assert_eq!(forecast.city_name.as_deref(), Some("Denver"));
    assert_eq!(forecast.samples.len(), 2);
    assert_eq!(forecast.skipped, 0);

    let days = aggregate(&forecast.samples, &DateLabeler::in_zone(chrono_tz::UTC));
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].average_precipitation_percent, 40.0);
    assert_eq!(days[0].min_temp, 28.0);
    assert_eq!(days[0].max_temp, 45.0);
    assert_eq!(days[0].icon, "01d");
}

#[tokio::test]
async fn test_unknown_city_is_location_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        // 404 must not be retried
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).fetch_forecast("Atlantis").await.unwrap_err();
    assert!(matches!(err, WeatherError::LocationNotFound(ref c) if c == "Atlantis"));
}

#[tokio::test]
async fn test_bad_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key."
        })))
        .mount(&server)
        .await;

    let err = provider(&server).fetch_forecast("Denver").await.unwrap_err();
    assert!(matches!(err, WeatherError::InvalidApiKey));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body(vec![entry(JAN_1, 30.0, 41.0, 0.2, "01d")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let forecast = provider(&server).fetch_forecast("Denver").await.unwrap();
    assert_eq!(forecast.samples.len(), 1);
}

#[tokio::test]
async fn test_persistent_server_error_surfaces_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "cod": 500,
            "message": "Internal error"
        })))
        // first attempt + 2 retries
        .expect(3)
        .mount(&server)
        .await;

    let err = provider(&server).fetch_forecast("Denver").await.unwrap_err();
    match err {
        WeatherError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_entries_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(vec![
            entry(JAN_1, 30.0, 41.0, 0.2, "01d"),
            serde_json::json!({"dt": JAN_1 + 3 * 3600, "main": {"temp_min": 20.0}}),
            entry(JAN_1 + 6 * 3600, 31.0, 40.0, 0.4, "02d"),
        ])))
        .mount(&server)
        .await;

    let forecast = provider(&server).fetch_forecast("Denver").await.unwrap();
    assert_eq!(forecast.samples.len(), 2);
    assert_eq!(forecast.skipped, 1);

    let days = outlook(
        &forecast.samples,
        &default_plants(),
        &DateLabeler::in_zone(chrono_tz::UTC),
    );
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].summary.sample_count, 2);
    assert!((days[0].summary.average_precipitation_percent - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_null_and_wrong_typed_entries_are_skipped() {
    let server = MockServer::start().await;

    let mut null_weather = entry(JAN_1 + 3 * 3600, 30.0, 41.0, 0.2, "01d");
    null_weather["weather"] = serde_json::Value::Null;
    let mut text_pop = entry(JAN_1 + 6 * 3600, 30.0, 41.0, 0.2, "01d");
    text_pop["pop"] = serde_json::json!("x");

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(vec![
            entry(JAN_1, 30.0, 41.0, 0.5, "01d"),
            serde_json::json!({"dt": JAN_1 + 3 * 3600, "main": null, "pop": 0.1}),
            null_weather,
            text_pop,
        ])))
        .mount(&server)
        .await;

    let forecast = provider(&server).fetch_forecast("Denver").await.unwrap();
    assert_eq!(forecast.samples.len(), 1);
    assert_eq!(forecast.skipped, 3);
    assert_eq!(forecast.samples[0].icon, "01d");
}

#[tokio::test]
async fn test_missing_list_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cod": "200"})))
        .mount(&server)
        .await;

    let err = provider(&server).fetch_forecast("Denver").await.unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)));
}

#[tokio::test]
async fn test_metric_units_in_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = WeatherProvider::new("test-key", UnitSystem::Metric)
        .unwrap()
        .with_base_url(&server.uri());
    let forecast = provider.fetch_forecast("Oslo").await.unwrap();
    assert!(forecast.samples.is_empty());
}
