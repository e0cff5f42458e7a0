//! Storage Layer
//!
//! The data store and authentication are hosted (Supabase). This crate
//! provides the collaborator traits the dashboard reads through, a
//! PostgREST/GoTrue client, and an in-memory implementation.

mod repository;
mod snapshot;
mod supabase;
mod supervisor;

pub use repository::{InMemoryStore, DEMO_EMAIL, DEMO_PASSWORD, DEMO_TOKEN};
pub use snapshot::fetch_snapshot;
pub use supabase::{SupabaseClient, SupabaseConfig};
pub use supervisor::{ensure_supervisor, supervisor_name, SUPERVISOR_ROLE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::{Driver, Event, Session};
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Data store returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Record not found")]
    NotFound,
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Data store unavailable: {0}")]
    Unavailable(String),
    #[error("Sign-up rejected: {0}")]
    Rejected(String),
}

/// Authenticated supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile fields supplied at sign-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Tokens issued by a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Result of registering a supervisor account. `session` is absent when
/// the backend requires email confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUp {
    pub user: User,
    pub session: Option<AuthSession>,
}

/// Row of the `supervisors` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supervisor {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
}

/// Fields a supervisor supplies when registering a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub email: String,
    #[serde(rename = "arduino_id")]
    pub hardware_id: String,
}

/// Row access to `drivers`, `driving_sessions` and `events`
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn get_driver(&self, driver_id: Uuid) -> Result<Driver, StorageError>;

    /// Newest session with status `active`, if any
    async fn latest_active_session(&self, driver_id: Uuid) -> Result<Option<Session>, StorageError>;

    /// All events of a session, newest first
    async fn session_events(&self, session_id: Uuid) -> Result<Vec<Event>, StorageError>;

    /// Roster ordered by name
    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError>;

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError>;

    async fn get_supervisor(&self, user_id: Uuid) -> Result<Option<Supervisor>, StorageError>;

    async fn insert_supervisor(&self, supervisor: Supervisor) -> Result<Supervisor, StorageError>;

    /// The same store acting as the supervisor holding `access_token`, so
    /// row-level policies see the signed-in user
    fn for_user(self: Arc<Self>, access_token: &str) -> Arc<dyn TelemetryStore>;
}

/// Supervisor authentication
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `None` for a missing, expired or invalid token
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, StorageError>;

    /// Password sign-in; `None` when the credentials are rejected
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, StorageError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, StorageError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), StorageError>;
}
