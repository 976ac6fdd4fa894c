//! Firebase collaborators for Plantcast.
//!
//! Email/password sign-in through the Identity Toolkit REST API, with auth
//! state published on a watch channel, and the per-user record (saved city)
//! in the Realtime Database.

pub mod auth;
pub mod error;
pub mod store;

pub use auth::{AuthClient, AuthState, Screen, User};
pub use error::FirebaseError;
pub use store::{UserRecord, UserStore};
