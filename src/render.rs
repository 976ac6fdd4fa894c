//! Plain-text rendering of the home view.

use std::fmt::Write;

use plantcast_weather::{DayOutlook, UnitSystem};

use crate::services::HomeState;

const PLANT_COLUMN: &str = "Plant Name";
const WATER_COLUMN: &str = "Should you Water it?";

/// Render one day box: date, rain chance and the plant table
pub fn render_day(day: &DayOutlook, units: UnitSystem) -> String {
    let summary = &day.summary;
    let suffix = units.temperature_suffix();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}  [{}]  Low {:.0}{} / High {:.0}{}",
        summary.calendar_date, summary.icon, summary.min_temp, suffix, summary.max_temp, suffix
    );
    let _ = writeln!(
        out,
        "Rain Probability: {:.1}%",
        summary.average_precipitation_percent
    );

    let width = day
        .recommendations
        .iter()
        .map(|r| r.plant.chars().count())
        .chain(std::iter::once(PLANT_COLUMN.len()))
        .max()
        .unwrap_or(PLANT_COLUMN.len());

    let _ = writeln!(out, "  {:<width$}  {}", PLANT_COLUMN, WATER_COLUMN, width = width);
    for rec in &day.recommendations {
        let answer = if rec.needs_watering { "Yes" } else { "No" };
        let _ = writeln!(out, "  {:<width$}  {}", rec.plant, answer, width = width);
    }

    out
}

/// Render the whole home view. `greeting` is the signed-in user's name.
pub fn render_home(state: &HomeState, greeting: Option<&str>, units: UnitSystem) -> String {
    let mut out = String::new();

    if let Some(name) = greeting {
        let _ = writeln!(out, "Welcome, {}!", name);
    }
    match state.resolved_city.as_deref().or(state.selected_city.as_deref()) {
        Some(city) => {
            let _ = writeln!(out, "What's the Forecast Looking Like? ({})", city);
        }
        None => {
            let _ = writeln!(out, "What's the Forecast Looking Like?");
        }
    }

    if let Some(error) = &state.error {
        let _ = writeln!(out, "\n{}", error);
    }

    match &state.outlook {
        Some(days) if days.is_empty() => {
            let _ = writeln!(out, "\nNo forecast data returned.");
        }
        Some(days) => {
            for day in days {
                let _ = write!(out, "\n{}", render_day(day, units));
            }
        }
        None if state.selected_city.is_none() => {
            let _ = writeln!(out, "\nPick a city with --city to see the forecast.");
        }
        None => {}
    }

    out
}
