//! Plantcast: should you water your plants this week?
//!
//! Signs the user in, seeds the city from their saved record, fetches the
//! 5-day forecast and prints a per-day watering table.

pub mod app;
pub mod cli;
pub mod render;
pub mod services;

pub use app::{App, Credentials, RunOutcome};
