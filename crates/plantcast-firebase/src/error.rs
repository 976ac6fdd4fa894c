//! Firebase-specific error types.

use plantcast_core::error::{AppError, AuthError, ReqwestErrorExt, StoreError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FirebaseError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailExists,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session token expired")]
    TokenExpired,

    /// Identity provider rejected the request for another reason
    #[error("Identity provider error ({status}): {code}")]
    Auth { status: u16, code: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Document store request failed
    #[error("Firebase API error ({status}): {code}")]
    Api { status: u16, code: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// `{"error": {"code": 400, "message": "EMAIL_NOT_FOUND"}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl FirebaseError {
    /// Map an Identity Toolkit error response to a typed error.
    ///
    /// Codes sometimes carry a suffix (`"WEAK_PASSWORD : Password should be..."`),
    /// so only the leading token is matched.
    pub(crate) fn from_auth_response(status: u16, body: &str) -> Self {
        let code = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        let token = code.split_whitespace().next().unwrap_or_default();

        match token {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_EMAIL" | "USER_DISABLED" => Self::InvalidCredentials,
            "EMAIL_EXISTS" => Self::EmailExists,
            "TOKEN_EXPIRED" => Self::TokenExpired,
            "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => Self::NotSignedIn,
            _ => Self::Auth { status, code },
        }
    }

    /// Whether the caller should sign in again before retrying.
    pub fn needs_sign_in(&self) -> bool {
        matches!(
            self,
            Self::NotSignedIn | Self::TokenExpired | Self::PermissionDenied(_)
        )
    }
}

impl From<FirebaseError> for AppError {
    fn from(e: FirebaseError) -> Self {
        match e {
            FirebaseError::InvalidCredentials => AppError::Auth(AuthError::InvalidCredentials),
            FirebaseError::EmailExists => AppError::Auth(AuthError::EmailExists),
            FirebaseError::NotSignedIn => AppError::Auth(AuthError::NotSignedIn),
            FirebaseError::TokenExpired => AppError::Auth(AuthError::TokenExpired),
            FirebaseError::Auth { status, code } => {
                AppError::Auth(AuthError::Provider(format!("{}: {}", status, code)))
            }
            FirebaseError::PermissionDenied(path) => {
                AppError::Store(StoreError::PermissionDenied(path))
            }
            FirebaseError::Api { status, code } => {
                AppError::Store(StoreError::RequestFailed(format!("{}: {}", status, code)))
            }
            FirebaseError::Parse(msg) => AppError::Store(StoreError::InvalidRecord(msg)),
            FirebaseError::Network(e) => AppError::Network(e.into_network_error()),
        }
    }
}
