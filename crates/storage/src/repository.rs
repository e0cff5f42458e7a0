//! In-memory store

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use telemetry::{
    ConnectionStatus, Driver, Event, EventSeverity, EventType, Session, SessionStatus,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    AuthProvider, AuthSession, NewDriver, SignUp, StorageError, Supervisor, TelemetryStore, User,
    UserMetadata,
};

/// Token accepted by the demo data set
pub const DEMO_TOKEN: &str = "demo-token";

/// Demo supervisor sign-in
pub const DEMO_EMAIL: &str = "sarah.johnson@company.com";
pub const DEMO_PASSWORD: &str = "demo-password";

const TOKEN_LIFETIME_SECS: u64 = 3_600;

/// Registered account; plain-text password, the store never leaves the process
struct Account {
    password: String,
    user: User,
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Unavailable(format!("Lock error: {}", e))
}

/// Store and auth provider backed by process memory
pub struct InMemoryStore {
    drivers: Mutex<Vec<Driver>>,
    sessions: Mutex<Vec<Session>>,
    /// Insertion order; reads sort newest first
    events: Mutex<Vec<Event>>,
    supervisors: Mutex<Vec<Supervisor>>,
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, User>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Creating in-memory store");
        Self {
            drivers: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::with_capacity(256)),
            supervisors: Mutex::new(Vec::new()),
            accounts: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Three drivers covering the excellent, critical and idle cases.
    /// Signs in a supervisor under [`DEMO_TOKEN`]; the same account accepts
    /// [`DEMO_EMAIL`] / [`DEMO_PASSWORD`].
    pub fn with_demo_data() -> Result<Self, StorageError> {
        let store = Self::new();
        let now = Utc::now();

        let michael = demo_driver("Michael Chen", "mchen@company.com", "ARD-001", 95, true);
        let aisha = demo_driver("Aisha Patel", "apatel@company.com", "ARD-004", 64, true);
        let james = demo_driver("James Wilson", "jwilson@company.com", "ARD-002", 88, false);

        let calm = demo_session(michael.id, now - Duration::minutes(42), Some(96));
        let rough = demo_session(aisha.id, now - Duration::minutes(75), Some(58));

        let swerve_at = now - Duration::minutes(30);
        store.insert_event(demo_event(
            calm.id,
            EventType::Swerving,
            EventSeverity::Low,
            swerve_at,
        ))?;

        let rough_events = [
            (EventType::HarshBrake, EventSeverity::Medium),
            (EventType::HarshBrake, EventSeverity::Medium),
            (EventType::HarshBrake, EventSeverity::High),
            (EventType::Swerving, EventSeverity::Medium),
            (EventType::Swerving, EventSeverity::Medium),
            (EventType::Swerving, EventSeverity::High),
            (EventType::Distracted, EventSeverity::Medium),
            (EventType::Distracted, EventSeverity::Medium),
            (EventType::Aggressive, EventSeverity::High),
            (EventType::Aggressive, EventSeverity::High),
            (EventType::Drowsy, EventSeverity::High),
            (EventType::EyesClosed, EventSeverity::High),
        ];
        for (i, (event_type, severity)) in rough_events.into_iter().enumerate() {
            let at = now - Duration::minutes(70) + Duration::minutes(5 * i as i64);
            store.insert_event(demo_event(rough.id, event_type, severity, at))?;
        }

        store.insert_driver_row(michael)?;
        store.insert_driver_row(aisha)?;
        store.insert_driver_row(james)?;
        store.insert_session(calm)?;
        store.insert_session(rough)?;
        let supervisor = User {
            id: Uuid::new_v4(),
            email: Some(DEMO_EMAIL.to_string()),
            user_metadata: UserMetadata {
                full_name: Some("Sarah Johnson".to_string()),
            },
        };
        store.register_account(DEMO_PASSWORD, supervisor.clone())?;
        store.issue_token(DEMO_TOKEN, supervisor)?;

        Ok(store)
    }

    pub fn insert_driver_row(&self, driver: Driver) -> Result<(), StorageError> {
        let mut drivers = self.drivers.lock().map_err(lock_err)?;
        drivers.retain(|d| d.id != driver.id);
        drivers.push(driver);
        Ok(())
    }

    pub fn insert_session(&self, session: Session) -> Result<(), StorageError> {
        let mut sessions = self.sessions.lock().map_err(lock_err)?;
        sessions.retain(|s| s.id != session.id);
        sessions.push(session);
        Ok(())
    }

    pub fn insert_event(&self, event: Event) -> Result<(), StorageError> {
        let mut events = self.events.lock().map_err(lock_err)?;
        debug!("Inserted {} event {}", event.event_type.as_str(), event.id);
        events.push(event);
        Ok(())
    }

    /// Mark a session ended
    pub fn end_session(&self, session_id: Uuid) -> Result<(), StorageError> {
        let mut sessions = self.sessions.lock().map_err(lock_err)?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(StorageError::NotFound)?;
        session.status = SessionStatus::Ended;
        session.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn issue_token(&self, token: &str, user: User) -> Result<(), StorageError> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.insert(token.to_string(), user);
        Ok(())
    }

    /// Register `user` for password sign-in under their email
    pub fn register_account(&self, password: &str, user: User) -> Result<(), StorageError> {
        let email = user
            .email
            .clone()
            .ok_or_else(|| StorageError::Rejected("email is required".to_string()))?;
        let mut accounts = self.accounts.lock().map_err(lock_err)?;
        if accounts.contains_key(&email) {
            return Err(StorageError::Rejected("User already registered".to_string()));
        }
        accounts.insert(
            email,
            Account {
                password: password.to_string(),
                user,
            },
        );
        Ok(())
    }

    fn open_session(&self, user: User) -> Result<AuthSession, StorageError> {
        let access_token = Uuid::new_v4().to_string();
        self.issue_token(&access_token, user.clone())?;
        Ok(AuthSession {
            access_token,
            refresh_token: None,
            expires_in: Some(TOKEN_LIFETIME_SECS),
            user,
        })
    }

    /// Simulate a backend outage: every read fails while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn get_driver(&self, driver_id: Uuid) -> Result<Driver, StorageError> {
        self.check_online()?;
        let drivers = self.drivers.lock().map_err(lock_err)?;
        drivers
            .iter()
            .find(|d| d.id == driver_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn latest_active_session(
        &self,
        driver_id: Uuid,
    ) -> Result<Option<Session>, StorageError> {
        self.check_online()?;
        let sessions = self.sessions.lock().map_err(lock_err)?;
        Ok(sessions
            .iter()
            .filter(|s| s.driver_id == driver_id && s.is_active())
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn session_events(&self, session_id: Uuid) -> Result<Vec<Event>, StorageError> {
        self.check_online()?;
        let events = self.events.lock().map_err(lock_err)?;
        let mut matching: Vec<Event> = events
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps later inserts first among equal timestamps
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError> {
        self.check_online()?;
        let drivers = self.drivers.lock().map_err(lock_err)?;
        let mut roster = drivers.clone();
        roster.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roster)
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError> {
        self.check_online()?;
        let row = Driver {
            id: Uuid::new_v4(),
            name: driver.name,
            email: driver.email,
            hardware_id: driver.hardware_id,
            connection_status: ConnectionStatus::Offline,
            safety_score: 100,
            last_active: None,
        };
        self.insert_driver_row(row.clone())?;
        info!("Registered driver {} ({})", row.name, row.id);
        Ok(row)
    }

    async fn get_supervisor(&self, user_id: Uuid) -> Result<Option<Supervisor>, StorageError> {
        self.check_online()?;
        let supervisors = self.supervisors.lock().map_err(lock_err)?;
        Ok(supervisors.iter().find(|s| s.user_id == user_id).cloned())
    }

    async fn insert_supervisor(&self, supervisor: Supervisor) -> Result<Supervisor, StorageError> {
        self.check_online()?;
        let mut supervisors = self.supervisors.lock().map_err(lock_err)?;
        supervisors.retain(|s| s.user_id != supervisor.user_id);
        supervisors.push(supervisor.clone());
        Ok(supervisor)
    }

    /// Rows are not scoped per user in memory
    fn for_user(self: Arc<Self>, _access_token: &str) -> Arc<dyn TelemetryStore> {
        self
    }
}

#[async_trait]
impl AuthProvider for InMemoryStore {
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, StorageError> {
        let tokens = self.tokens.lock().map_err(lock_err)?;
        Ok(tokens.get(access_token).cloned())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, StorageError> {
        let user = {
            let accounts = self.accounts.lock().map_err(lock_err)?;
            match accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Ok(None),
            }
        };
        self.open_session(user).map(Some)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, StorageError> {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: UserMetadata {
                full_name: full_name.map(str::to_string),
            },
        };
        self.register_account(password, user.clone())?;
        let session = self.open_session(user.clone())?;
        Ok(SignUp {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), StorageError> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.remove(access_token);
        Ok(())
    }
}

fn demo_driver(name: &str, email: &str, hardware_id: &str, score: u8, online: bool) -> Driver {
    Driver {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        hardware_id: hardware_id.to_string(),
        connection_status: if online {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        },
        safety_score: score,
        last_active: Some(Utc::now()),
    }
}

fn demo_session(driver_id: Uuid, started_at: chrono::DateTime<Utc>, score: Option<u8>) -> Session {
    Session {
        id: Uuid::new_v4(),
        driver_id,
        status: SessionStatus::Active,
        started_at,
        ended_at: None,
        safety_score: score,
    }
}

fn demo_event(
    session_id: Uuid,
    event_type: EventType,
    severity: EventSeverity,
    timestamp: chrono::DateTime<Utc>,
) -> Event {
    let (x, y, z) = if event_type.is_motion() {
        (Some(-0.8), Some(0.4), Some(9.8))
    } else {
        (None, None, None)
    };
    Event {
        id: Uuid::new_v4(),
        session_id,
        event_type,
        severity,
        timestamp,
        x,
        y,
        z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_roster_sorted_by_name() {
        let store = InMemoryStore::with_demo_data().unwrap();
        let names: Vec<String> = store
            .list_drivers()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Aisha Patel", "James Wilson", "Michael Chen"]);
        assert_eq!(store.event_count(), 13);
    }

    #[tokio::test]
    async fn test_latest_active_session_and_events_newest_first() {
        let store = InMemoryStore::new();
        let driver = demo_driver("Emily Rodriguez", "erodriguez@company.com", "ARD-003", 91, true);
        let driver_id = driver.id;
        store.insert_driver_row(driver).unwrap();

        let now = Utc::now();
        let older = demo_session(driver_id, now - Duration::hours(3), None);
        let newer = demo_session(driver_id, now - Duration::minutes(10), Some(90));
        store.insert_session(older.clone()).unwrap();
        store.insert_session(newer.clone()).unwrap();

        let latest = store.latest_active_session(driver_id).await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);

        store.end_session(newer.id).unwrap();
        let latest = store.latest_active_session(driver_id).await.unwrap().unwrap();
        assert_eq!(latest.id, older.id);

        let first = demo_event(
            older.id,
            EventType::Distracted,
            EventSeverity::Low,
            now - Duration::minutes(5),
        );
        let second = demo_event(
            older.id,
            EventType::HarshBrake,
            EventSeverity::High,
            now - Duration::minutes(1),
        );
        store.insert_event(first.clone()).unwrap();
        store.insert_event(second.clone()).unwrap();

        let events = store.session_events(older.id).await.unwrap();
        assert_eq!(events[0].id, second.id);
        assert_eq!(events[1].id, first.id);
    }

    #[tokio::test]
    async fn test_missing_driver() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get_driver(Uuid::new_v4()).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_insert_driver_defaults() {
        let store = InMemoryStore::new();
        let driver = store
            .insert_driver(NewDriver {
                name: "Priya Nair".to_string(),
                email: "pnair@company.com".to_string(),
                hardware_id: "ARD-007".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(driver.safety_score, 100);
        assert!(!driver.is_online());
        assert_eq!(store.get_driver(driver.id).await.unwrap(), driver);
    }

    #[tokio::test]
    async fn test_offline_reads_fail() {
        let store = InMemoryStore::with_demo_data().unwrap();
        store.set_offline(true);
        assert!(matches!(
            store.list_drivers().await,
            Err(StorageError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.list_drivers().await.is_ok());
    }

    #[tokio::test]
    async fn test_tokens() {
        let store = InMemoryStore::with_demo_data().unwrap();
        assert!(store.current_user(DEMO_TOKEN).await.unwrap().is_some());
        assert!(store.current_user("nope").await.unwrap().is_none());

        store.sign_out(DEMO_TOKEN).await.unwrap();
        assert!(store.current_user(DEMO_TOKEN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let store = InMemoryStore::with_demo_data().unwrap();
        assert!(store.sign_in(DEMO_EMAIL, "wrong").await.unwrap().is_none());
        assert!(store.sign_in("nobody@company.com", DEMO_PASSWORD).await.unwrap().is_none());

        let session = store.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap().unwrap();
        assert_ne!(session.access_token, DEMO_TOKEN);
        let user = store.current_user(&session.access_token).await.unwrap().unwrap();
        assert_eq!(user, session.user);
        assert_eq!(user.user_metadata.full_name.as_deref(), Some("Sarah Johnson"));
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let store = InMemoryStore::new();
        let created = store
            .sign_up("dkim@company.com", "s3cret", Some("Daniel Kim"))
            .await
            .unwrap();
        assert!(created.session.is_some());

        assert!(matches!(
            store.sign_up("dkim@company.com", "other", None).await,
            Err(StorageError::Rejected(_))
        ));

        let session = store.sign_in("dkim@company.com", "s3cret").await.unwrap().unwrap();
        assert_eq!(session.user.id, created.user.id);
    }
}
