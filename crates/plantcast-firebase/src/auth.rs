//! Email/password authentication against the Identity Toolkit REST API.
//!
//! Auth state changes are published on a `tokio::sync::watch` channel
//! instead of listener callbacks: subscribers see every transition and
//! always have the latest state available.

use chrono::{DateTime, Duration, Utc};
use plantcast_core::config::DEFAULT_FIREBASE_AUTH_URL;
use plantcast_core::FirebaseConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

use crate::error::FirebaseError;

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Sent as `auth=` to the Realtime Database
    pub id_token: String,
    pub expires_at: DateTime<Utc>,
}

impl User {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Name for greetings: display name, else email, else uid
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Nothing resolved yet
    #[default]
    Loading,
    SignedIn(User),
    SignedOut,
    /// The last auth attempt failed; there is no user
    Error(String),
}

/// Which top-level view the auth state allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    SignIn,
    Home,
}

impl AuthState {
    pub fn screen(&self) -> Screen {
        match self {
            Self::Loading => Screen::Loading,
            Self::SignedIn(_) => Screen::Home,
            Self::SignedOut | Self::Error(_) => Screen::SignIn,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    /// Seconds, as a string
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateResponse {
    display_name: Option<String>,
}

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

impl TokenResponse {
    fn into_user(self) -> User {
        let now = Utc::now();
        let lifetime = self
            .expires_in
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        let expires_at = now
            .checked_add_signed(lifetime)
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        User {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name.filter(|n| !n.is_empty()),
            id_token: self.id_token,
            expires_at,
        }
    }
}

/// Identity provider client
pub struct AuthClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    state: watch::Sender<AuthState>,
}

impl AuthClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_FIREBASE_AUTH_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            state,
        }
    }

    pub fn from_config(config: &FirebaseConfig) -> Self {
        Self::with_base_url(&config.api_key, &config.auth_url)
    }

    /// Receive every auth state change, starting from the current one
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    fn publish(&self, next: AuthState) {
        tracing::debug!("Auth state -> {:?}", next.screen());
        self.state.send_replace(next);
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown email / wrong password; the state
    /// becomes `Error` on any failure.
    #[instrument(skip(self, password), level = "info")]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, FirebaseError> {
        let result = self
            .password_request("accounts:signInWithPassword", email, password)
            .await;
        self.settle(result)
    }

    /// Create an account and optionally set its display name.
    ///
    /// # Errors
    /// `EmailExists` if the email is taken; the state becomes `Error` on any failure.
    #[instrument(skip(self, password), level = "info")]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, FirebaseError> {
        let result = self.create_account(email, password, display_name).await;
        self.settle(result)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, FirebaseError> {
        let mut user = self
            .password_request("accounts:signUp", email, password)
            .await?;

        // The account exists at this point; a failed profile update only
        // loses the display name.
        if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
            match self.update_display_name(&user.id_token, name).await {
                Ok(updated) => user.display_name = updated,
                Err(e) => tracing::warn!("Failed to set display name for {}: {}", user.uid, e),
            }
        }
        Ok(user)
    }

    /// Forget the current user
    pub fn sign_out(&self) {
        if let Some(user) = self.current_user() {
            tracing::info!("Signing out {}", user.uid);
        }
        self.publish(AuthState::SignedOut);
    }

    fn settle(&self, result: Result<User, FirebaseError>) -> Result<User, FirebaseError> {
        match &result {
            Ok(user) => {
                tracing::info!("Signed in as {}", user.uid);
                self.publish(AuthState::SignedIn(user.clone()));
            }
            Err(e) => {
                tracing::error!("Auth state error: {}", e);
                self.publish(AuthState::Error(e.to_string()));
            }
        }
        result
    }

    async fn password_request(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<User, FirebaseError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let resp: TokenResponse = self.post(endpoint, &body).await?;
        Ok(resp.into_user())
    }

    async fn update_display_name(
        &self,
        id_token: &str,
        display_name: &str,
    ) -> Result<Option<String>, FirebaseError> {
        let body = ProfileUpdateRequest {
            id_token,
            display_name,
            return_secure_token: false,
        };
        let resp: ProfileUpdateResponse = self.post("accounts:update", &body).await?;
        Ok(resp.display_name)
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, FirebaseError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| FirebaseError::Parse(format!("{}: {}", endpoint, e)))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(FirebaseError::from_auth_response(status.as_u16(), &text))
        }
    }
}
