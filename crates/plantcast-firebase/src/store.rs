//! Per-user records in the Realtime Database (`/users/{uid}`).

use plantcast_core::FirebaseConfig;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::auth::User;
use crate::error::FirebaseError;

/// What we keep for each user. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub city: Option<String>,
}

impl UserRecord {
    /// The saved city, if one is set and not blank
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct CityPatch<'a> {
    city: &'a str,
}

pub struct UserStore {
    client: reqwest::Client,
    database_url: String,
}

impl UserStore {
    pub fn new(database_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            database_url: database_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &FirebaseConfig) -> Self {
        Self::new(&config.database_url)
    }

    /// Refuse to send a token the database would reject anyway
    fn check_session(user: &User) -> Result<(), FirebaseError> {
        if user.is_expired() {
            tracing::warn!("Session for {} expired at {}", user.uid, user.expires_at);
            return Err(FirebaseError::TokenExpired);
        }
        Ok(())
    }

    fn user_url(&self, uid: &str) -> String {
        format!("{}/users/{}.json", self.database_url, urlencoding::encode(uid))
    }

    /// Read the user's record. A missing record is `Ok(None)`, not an error.
    ///
    /// # Errors
    /// `TokenExpired` when the user's token has run out (nothing is sent),
    /// `PermissionDenied` when the database rules reject the token,
    /// `Api`/`Network` for other failures.
    #[instrument(skip(self, user), fields(uid = %user.uid), level = "info")]
    pub async fn get_user_record(&self, user: &User) -> Result<Option<UserRecord>, FirebaseError> {
        Self::check_session(user)?;
        let response = self
            .client
            .get(self.user_url(&user.uid))
            .query(&[("auth", user.id_token.as_str())])
            .send()
            .await?;

        let record: Option<UserRecord> = self.handle_response(response, &user.uid).await?;
        if record.is_none() {
            tracing::debug!("No record stored for user");
        }
        Ok(record)
    }

    /// Store `city` on the user's record, leaving other fields alone.
    ///
    /// # Errors
    /// Same as [`UserStore::get_user_record`].
    #[instrument(skip(self, user), fields(uid = %user.uid), level = "info")]
    pub async fn save_city(&self, user: &User, city: &str) -> Result<(), FirebaseError> {
        Self::check_session(user)?;
        let response = self
            .client
            .patch(self.user_url(&user.uid))
            .query(&[("auth", user.id_token.as_str())])
            .json(&CityPatch { city })
            .send()
            .await?;

        let _: serde_json::Value = self.handle_response(response, &user.uid).await?;
        tracing::info!("Saved city for user");
        Ok(())
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        uid: &str,
    ) -> Result<T, FirebaseError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| FirebaseError::Parse(format!("users/{}: {}", uid, e)))
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            Err(FirebaseError::PermissionDenied(format!("users/{}", uid)))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(FirebaseError::Api {
                status: status.as_u16(),
                code: text,
            })
        }
    }
}
