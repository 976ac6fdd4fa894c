//! Composition root: owns every external client and the forecast service.

use std::sync::Arc;

use plantcast_core::{AppError, AuthError, Config, ConfigError};
use plantcast_firebase::{AuthClient, FirebaseError, Screen, User, UserStore};
use plantcast_weather::{default_plants, DateLabeler, WeatherProvider};

use crate::services::{ForecastService, HomeState};

/// How the user identifies themselves for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        display_name: Option<String>,
    },
}

/// Which view a run ends on
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nobody is signed in. `message` says why when an attempt failed.
    SignIn { message: Option<String> },
    Home { greeting: String, state: HomeState },
}

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    auth: AuthClient,
    store: Option<UserStore>,
    forecast: ForecastService,
}

impl App {
    /// Build every client from `config`.
    ///
    /// # Errors
    /// Fails when the weather API key is missing, the forecast timezone is
    /// unknown or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, AppError> {
        if !config.weather.is_configured() {
            return Err(ConfigError::MissingSetting("weather.api_key".to_string()).into());
        }

        let labeler = DateLabeler::from_config(&config.forecast)?;
        let provider = WeatherProvider::from_config(&config.weather, &config.retry)?;
        let auth = AuthClient::from_config(&config.firebase);
        let store = if config.firebase.database_url.is_empty() {
            tracing::warn!("No database URL configured; saved cities are disabled");
            None
        } else {
            Some(UserStore::from_config(&config.firebase))
        };

        let forecast = ForecastService::new(Arc::new(provider), labeler, default_plants());

        tracing::info!(
            "Application initialized (units: {})",
            config.weather.units.as_query()
        );

        Ok(Self {
            config: Arc::new(config),
            auth,
            store,
            forecast,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn forecast(&self) -> &ForecastService {
        &self.forecast
    }

    /// # Errors
    /// Propagates identity provider failures.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AppError> {
        Ok(self.auth.sign_in(email, password).await?)
    }

    /// # Errors
    /// Propagates identity provider failures.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AppError> {
        Ok(self.auth.sign_up(email, password, display_name).await?)
    }

    /// The user's saved city. A missing record, and any lookup failure,
    /// just means "no default city". A rejected session signs the user out.
    pub async fn saved_city(&self, user: &User) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get_user_record(user).await {
            Ok(record) => record.and_then(|r| r.city().map(str::to_string)),
            Err(e) => {
                tracing::error!("Issue getting user data: {}", e);
                self.end_session_if_rejected(&e);
                None
            }
        }
    }

    /// # Errors
    /// Fails without a configured database or when the write is rejected.
    pub async fn save_city(&self, user: &User, city: &str) -> Result<(), AppError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSetting("firebase.database_url".to_string()))?;
        store.save_city(user, city.trim()).await.map_err(|e| {
            self.end_session_if_rejected(&e);
            e.into()
        })
    }

    fn end_session_if_rejected(&self, e: &FirebaseError) {
        if e.needs_sign_in() {
            tracing::warn!("Session rejected by the store; signing out");
            self.auth.sign_out();
        }
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<User, AppError> {
        match credentials {
            Credentials::SignIn { email, password } => self.sign_in(&email, &password).await,
            Credentials::SignUp {
                email,
                password,
                display_name,
            } => {
                self.sign_up(&email, &password, display_name.as_deref())
                    .await
            }
        }
    }

    /// One pass through the app: sign in, pick the city (the override, else
    /// the saved one), remember an override that differs from the saved
    /// city, then fetch the forecast.
    ///
    /// The home view is only reached with a signed-in user.
    pub async fn run(
        &mut self,
        credentials: Option<Credentials>,
        city_override: Option<&str>,
    ) -> RunOutcome {
        let user = match credentials {
            Some(credentials) => match self.authenticate(credentials).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!("Authentication failed: {}", e);
                    return RunOutcome::SignIn {
                        message: Some(e.user_message().to_string()),
                    };
                }
            },
            None => {
                self.auth.sign_out();
                return RunOutcome::SignIn { message: None };
            }
        };

        let saved = self.saved_city(&user).await;
        if let Some(outcome) = self.session_ended() {
            return outcome;
        }

        let city_override = city_override.map(str::trim).filter(|c| !c.is_empty());

        if let Some(city) = city_override {
            if saved.as_deref() != Some(city) && self.store.is_some() {
                if let Err(e) = self.save_city(&user, city).await {
                    tracing::error!("Failed to save city: {}", e);
                }
            }
        }

        if let Some(outcome) = self.session_ended() {
            return outcome;
        }

        let state = match city_override.map(str::to_string).or(saved) {
            Some(city) => self.show_forecast(&city).await.clone(),
            None => self.forecast.state().clone(),
        };

        RunOutcome::Home {
            greeting: user.greeting_name().to_string(),
            state,
        }
    }

    /// `Some` once the store has rejected the session and signed the user out
    fn session_ended(&self) -> Option<RunOutcome> {
        if self.auth.current().screen() == Screen::Home {
            return None;
        }
        let expired = AppError::from(AuthError::TokenExpired);
        Some(RunOutcome::SignIn {
            message: Some(expired.user_message().to_string()),
        })
    }

    /// Fetch `city` and wait until its outlook (or error) is in place.
    pub async fn show_forecast(&mut self, city: &str) -> &HomeState {
        self.forecast.fetch_and_settle(city).await
    }

    /// Shutdown the application
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down application");
        if self.auth.current_user().is_some() {
            self.auth.sign_out();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weather_key_is_rejected() {
        let err = App::new(Config::default()).err().unwrap();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::MissingSetting(ref s)) if s == "weather.api_key"
        ));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let mut config = Config::default();
        config.weather.api_key = "key".to_string();
        config.forecast.timezone = "Nowhere/Special".to_string();
        assert!(matches!(App::new(config), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_save_city_without_database() {
        let mut config = Config::default();
        config.weather.api_key = "key".to_string();
        let app = App::new(config).unwrap();

        let user = User {
            uid: "uid".to_string(),
            email: None,
            display_name: None,
            id_token: "t".to_string(),
            expires_at: chrono::Utc::now(),
        };
        assert!(app.saved_city(&user).await.is_none());
        assert!(app.save_city(&user, "Denver").await.is_err());
    }
}
