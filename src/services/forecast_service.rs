//! Forecast fetching with "latest request wins" semantics.
//!
//! Every request gets a generation number. Fetches run on the tokio runtime
//! and report back over an mpsc channel; a result is only applied when its
//! generation is still the newest one issued. Starting a new request also
//! cancels the previous in-flight fetch.

use std::sync::Arc;

use plantcast_core::AppError;
use plantcast_weather::{
    outlook, DateLabeler, DayOutlook, Forecast, PlantRainRule, WeatherError, WeatherProvider,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Messages sent from fetch tasks back to the service
#[derive(Debug)]
pub enum ForecastMessage {
    FetchDone {
        generation: u64,
        city: String,
        result: Result<Forecast, WeatherError>,
    },
}

/// What the home view shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeState {
    /// City of the most recent request
    pub selected_city: Option<String>,
    /// City name as resolved by the weather API for the shown outlook
    pub resolved_city: Option<String>,
    pub outlook: Option<Vec<DayOutlook>>,
    /// User-visible message for the last failed request
    pub error: Option<String>,
    pub loading: bool,
}

pub struct ForecastService {
    provider: Arc<WeatherProvider>,
    labeler: DateLabeler,
    plants: Vec<PlantRainRule>,
    tx: mpsc::UnboundedSender<ForecastMessage>,
    rx: mpsc::UnboundedReceiver<ForecastMessage>,
    generation: u64,
    in_flight: Option<CancellationToken>,
    state: HomeState,
}

impl ForecastService {
    pub fn new(
        provider: Arc<WeatherProvider>,
        labeler: DateLabeler,
        plants: Vec<PlantRainRule>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            labeler,
            plants,
            tx,
            rx,
            generation: 0,
            in_flight: None,
            state: HomeState::default(),
        }
    }

    pub fn state(&self) -> &HomeState {
        &self.state
    }

    /// Start fetching `city`, superseding any request still in flight.
    ///
    /// Blank input is ignored and returns `None`. Must be called from within
    /// a tokio runtime.
    pub fn request_fetch(&mut self, city: &str) -> Option<u64> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }

        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());

        self.state.selected_city = Some(city.to_string());
        self.state.loading = true;

        tracing::info!("Requesting forecast for {} (generation {})", city, generation);

        let tx = self.tx.clone();
        let provider = Arc::clone(&self.provider);
        let city = city.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Forecast request {} superseded", generation);
                }
                result = provider.fetch_forecast(&city) => {
                    let _ = tx.send(ForecastMessage::FetchDone { generation, city, result });
                }
            }
        });

        Some(generation)
    }

    /// Apply a fetch result. Returns `false` when the message was stale and
    /// has been discarded.
    pub fn handle_message(&mut self, msg: ForecastMessage) -> bool {
        match msg {
            ForecastMessage::FetchDone {
                generation,
                city,
                result,
            } => {
                if generation != self.generation {
                    tracing::debug!(
                        "Discarding stale forecast for {} (generation {}, latest {})",
                        city,
                        generation,
                        self.generation
                    );
                    return false;
                }

                self.in_flight = None;
                self.state.loading = false;

                match result {
                    Ok(forecast) => {
                        let days = outlook(&forecast.samples, &self.plants, &self.labeler);
                        tracing::info!("Forecast for {}: {} days", city, days.len());
                        self.state.resolved_city = forecast.city_name.or(Some(city));
                        self.state.outlook = Some(days);
                        self.state.error = None;
                    }
                    Err(e) => {
                        tracing::error!("Error fetching forecast for {}: {}", city, e);
                        // Previous outlook stays visible under the message
                        self.state.error = Some(AppError::from(e).user_message().to_string());
                    }
                }
                true
            }
        }
    }

    /// Process messages until the newest request has been applied.
    pub async fn settle(&mut self) -> &HomeState {
        while self.state.loading {
            match self.rx.recv().await {
                Some(msg) => {
                    self.handle_message(msg);
                }
                None => break,
            }
        }
        &self.state
    }

    /// [`request_fetch`](Self::request_fetch) then [`settle`](Self::settle).
    pub async fn fetch_and_settle(&mut self, city: &str) -> &HomeState {
        self.request_fetch(city);
        self.settle().await
    }
}
