//! Fleet Telemetry Model
//!
//! Rows written by the in-vehicle ingestion pipeline and read by the dashboard:
//! - Drivers and their connection state
//! - Driving sessions with a running safety score
//! - Motion and attention events
//!
//! Also reduces a session's event list into per-category counts.

pub mod aggregate;
pub mod model;

pub use aggregate::{recent_categories, Category, EventCounts};
pub use model::{
    ConnectionStatus, Driver, Event, EventSeverity, EventType, Session, SessionStatus,
    TelemetrySnapshot,
};
