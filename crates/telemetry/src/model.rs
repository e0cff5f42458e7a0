//! Row types for the `drivers`, `driving_sessions` and `events` tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection state reported by the driver's hardware unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    #[default]
    #[serde(other)]
    Offline,
}

/// A monitored driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Identifier of the sensor unit installed in the vehicle
    #[serde(rename = "arduino_id", default)]
    pub hardware_id: String,
    #[serde(default)]
    pub connection_status: ConnectionStatus,
    /// Cumulative safety score (0-100)
    pub safety_score: u8,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

impl Driver {
    /// First word of the display name
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Upper-cased initials, e.g. "Michael Chen" -> "MC"
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }

    pub fn is_online(&self) -> bool {
        self.connection_status == ConnectionStatus::Online
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    #[serde(other)]
    Ended,
}

/// One continuous driving interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Per-session score; the driver's score applies when absent
    #[serde(default)]
    pub safety_score: Option<u8>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Elapsed time since start, formatted as "42m" or "1h 5m"
    pub fn duration_label(&self, now: DateTime<Utc>) -> String {
        let minutes = (now - self.started_at).num_minutes().max(0);
        if minutes < 60 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

/// Detected incident type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Swerving,
    HarshBrake,
    Aggressive,
    Distracted,
    Drowsy,
    EyesClosed,
    /// Any type this dashboard does not categorise
    #[serde(other)]
    Other,
}

impl EventType {
    /// Wire name as stored in the `events` table
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Swerving => "SWERVING",
            EventType::HarshBrake => "HARSH_BRAKE",
            EventType::Aggressive => "AGGRESSIVE",
            EventType::Distracted => "DISTRACTED",
            EventType::Drowsy => "DROWSY",
            EventType::EyesClosed => "EYES_CLOSED",
            EventType::Other => "OTHER",
        }
    }

    /// Accelerometer-derived types carry axis readings
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            EventType::Swerving | EventType::HarshBrake | EventType::Aggressive
        )
    }
}

/// Severity label assigned at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Low,
    Medium,
    High,
}

/// A single detected incident within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: Uuid,
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

/// Everything one refresh cycle reads for a driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub driver: Driver,
    /// Most recent active session, if any
    pub session: Option<Session>,
    /// Events of `session`, newest first
    pub events: Vec<Event>,
}

impl TelemetrySnapshot {
    /// Session score, falling back to the driver's cumulative score
    pub fn effective_score(&self) -> u8 {
        // Deliberate: a recorded session score of 0 is shown as 0. Only a
        // missing score falls back, unlike a falsy-zero `||` fallback.
        self.session
            .as_ref()
            .and_then(|s| s.safety_score)
            .unwrap_or(self.driver.safety_score)
    }

    pub fn total_events(&self) -> usize {
        self.events.len()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn driver() -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: "Aisha Patel".to_string(),
            email: "apatel@company.com".to_string(),
            hardware_id: "ARD-004".to_string(),
            connection_status: ConnectionStatus::Online,
            safety_score: 76,
            last_active: None,
        }
    }

    #[test]
    fn test_driver_row_from_postgrest() {
        let json = r#"{
            "id": "8a6e0804-2bd0-4672-b79d-d97027f9071a",
            "name": "Michael Chen",
            "email": "mchen@company.com",
            "arduino_id": "ARD-001",
            "connection_status": "online",
            "status": "active",
            "safety_score": 95,
            "last_active": "2025-01-10T14:03:22.512+00:00"
        }"#;

        let driver: Driver = serde_json::from_str(json).unwrap();
        assert_eq!(driver.hardware_id, "ARD-001");
        assert!(driver.is_online());
        assert_eq!(driver.safety_score, 95);
        assert!(driver.last_active.is_some());
    }

    #[test]
    fn test_unknown_enums_fall_back() {
        let status: SessionStatus = serde_json::from_str(r#""completed""#).unwrap();
        assert_eq!(status, SessionStatus::Ended);

        let conn: ConnectionStatus = serde_json::from_str(r#""reconnecting""#).unwrap();
        assert_eq!(conn, ConnectionStatus::Offline);

        let ty: EventType = serde_json::from_str(r#""SPEEDING""#).unwrap();
        assert_eq!(ty, EventType::Other);
    }

    #[test]
    fn test_event_type_wire_names() {
        let ty: EventType = serde_json::from_str(r#""HARSH_BRAKE""#).unwrap();
        assert_eq!(ty, EventType::HarshBrake);
        assert_eq!(ty.as_str(), "HARSH_BRAKE");
        assert_eq!(
            serde_json::to_string(&EventType::EyesClosed).unwrap(),
            r#""EYES_CLOSED""#
        );
        assert!(EventType::Swerving.is_motion());
        assert!(!EventType::Drowsy.is_motion());
    }

    #[test]
    fn test_initials_and_first_name() {
        let d = driver();
        assert_eq!(d.initials(), "AP");
        assert_eq!(d.first_name(), "Aisha");
    }

    #[test]
    fn test_duration_label() {
        let start = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            status: SessionStatus::Active,
            started_at: start,
            ended_at: None,
            safety_score: None,
        };

        assert_eq!(session.duration_label(start + Duration::minutes(42)), "42m");
        assert_eq!(session.duration_label(start + Duration::minutes(65)), "1h 5m");
        assert_eq!(session.duration_label(start - Duration::minutes(3)), "0m");
    }

    #[test]
    fn test_effective_score_falls_back_to_driver() {
        let d = driver();
        let mut session = Session {
            id: Uuid::new_v4(),
            driver_id: d.id,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            safety_score: None,
        };
        let mut snapshot = TelemetrySnapshot {
            driver: d,
            session: Some(session.clone()),
            events: vec![],
        };
        assert_eq!(snapshot.effective_score(), 76);

        session.safety_score = Some(58);
        snapshot.session = Some(session.clone());
        assert_eq!(snapshot.effective_score(), 58);

        session.safety_score = Some(0);
        snapshot.session = Some(session);
        assert_eq!(snapshot.effective_score(), 0);
    }
}
