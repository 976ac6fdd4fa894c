//! Forecast data for Plantcast.
//!
//! Fetches the 5-day / 3-hour forecast from OpenWeatherMap, folds the
//! samples into per-day summaries and derives which plants need watering.

pub mod aggregate;
pub mod plants;
pub mod provider;
pub mod retry;
pub mod types;

pub use aggregate::{aggregate, outlook, recommend, CalendarZone, DateLabeler};
pub use plants::default_plants;
pub use provider::WeatherProvider;
pub use retry::RetryConfig;
pub use types::*;
