//! Folding 3-hour forecast samples into daily summaries.
//!
//! Samples are grouped by their *rendered* calendar date in an explicit
//! timezone. Days come out in the order they are first seen in the input,
//! which for the weather API is chronological but is never re-sorted here.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate, Utc};
use plantcast_core::config::{ForecastConfig, DEFAULT_DATE_FORMAT};
use plantcast_core::ConfigError;

use crate::types::{
    DailySummary, DayOutlook, ForecastSample, PlantRainRule, WateringRecommendation,
};

/// Timezone used to decide which calendar day a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarZone {
    /// The host's configured zone
    Local,
    Named(chrono_tz::Tz),
}

impl CalendarZone {
    fn date_of(&self, time: &DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => time.with_timezone(&Local).date_naive(),
            Self::Named(tz) => time.with_timezone(tz).date_naive(),
        }
    }
}

/// Renders a sample's instant as the date string used for grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLabeler {
    zone: CalendarZone,
    format: String,
}

impl DateLabeler {
    pub fn new(zone: CalendarZone) -> Self {
        Self {
            zone,
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn in_zone(tz: chrono_tz::Tz) -> Self {
        Self::new(CalendarZone::Named(tz))
    }

    pub fn local() -> Self {
        Self::new(CalendarZone::Local)
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Build from the `[forecast]` config section.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for an unknown timezone name.
    pub fn from_config(config: &ForecastConfig) -> Result<Self, ConfigError> {
        let zone = match config.named_zone()? {
            Some(tz) => CalendarZone::Named(tz),
            None => CalendarZone::Local,
        };
        Ok(Self::new(zone).with_format(config.date_format.clone()))
    }

    pub fn zone(&self) -> CalendarZone {
        self.zone
    }

    /// Date string for `time`. Patterns chrono can't apply to a plain date
    /// (time-of-day or offset fields) fall back to ISO `YYYY-MM-DD`.
    pub fn label(&self, time: &DateTime<Utc>) -> String {
        let date = self.zone.date_of(time);
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.format)).is_err() {
            tracing::debug!("Date format {:?} not applicable to a date", self.format);
            return date.format("%Y-%m-%d").to_string();
        }
        out
    }
}

#[derive(Debug)]
struct DayAccumulator {
    count: usize,
    total_probability: f64,
    min_temp: f64,
    max_temp: f64,
    icon: String,
}

impl DayAccumulator {
    fn seed(sample: &ForecastSample) -> Self {
        Self {
            count: 1,
            total_probability: sample.precipitation_probability,
            min_temp: sample.min_temp,
            max_temp: sample.max_temp,
            icon: sample.icon.clone(),
        }
    }

    fn add(&mut self, sample: &ForecastSample) {
        self.count += 1;
        self.total_probability += sample.precipitation_probability;
        if sample.min_temp < self.min_temp {
            self.min_temp = sample.min_temp;
        }
        if sample.max_temp > self.max_temp {
            self.max_temp = sample.max_temp;
        }
    }

    fn finish(self, calendar_date: String) -> DailySummary {
        let average = self.total_probability / self.count as f64 * 100.0;
        DailySummary {
            calendar_date,
            sample_count: self.count,
            average_precipitation_percent: round_to(average, 1),
            min_temp: round_to(self.min_temp, 0),
            max_temp: round_to(self.max_temp, 0),
            icon: self.icon,
        }
    }
}

/// Round half away from zero to `decimals` places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Group samples into one summary per rendered date, in first-seen order.
pub fn aggregate(samples: &[ForecastSample], labeler: &DateLabeler) -> Vec<DailySummary> {
    let mut order: Vec<String> = Vec::new();
    let mut days: HashMap<String, DayAccumulator> = HashMap::new();

    for sample in samples {
        let date = labeler.label(&sample.time);
        match days.get_mut(&date) {
            Some(acc) => acc.add(sample),
            None => {
                days.insert(date.clone(), DayAccumulator::seed(sample));
                order.push(date);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|date| days.remove(&date).map(|acc| acc.finish(date)))
        .collect()
}

/// Watering advice for one day: a plant needs water when the rain chance is
/// strictly below its threshold.
pub fn recommend(summary: &DailySummary, rules: &[PlantRainRule]) -> Vec<WateringRecommendation> {
    rules
        .iter()
        .map(|rule| WateringRecommendation {
            plant: rule.name.clone(),
            needs_watering: summary.average_precipitation_percent < rule.rain_threshold_percent,
        })
        .collect()
}

/// [`aggregate`] followed by [`recommend`] for every day.
pub fn outlook(
    samples: &[ForecastSample],
    rules: &[PlantRainRule],
    labeler: &DateLabeler,
) -> Vec<DayOutlook> {
    aggregate(samples, labeler)
        .into_iter()
        .map(|summary| {
            let recommendations = recommend(&summary, rules);
            DayOutlook {
                summary,
                recommendations,
            }
        })
        .collect()
}
