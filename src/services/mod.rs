pub mod forecast_service;

pub use forecast_service::{ForecastMessage, ForecastService, HomeState};
