//! Derived detail-view state

use chrono::{DateTime, Utc};
use safety_status::{classify, ClassifierInput, ScoreBand, StatusSummary};
use serde::{Deserialize, Serialize};
use telemetry::{recent_categories, Category, EventCounts, TelemetrySnapshot};

/// Everything the detail view renders after one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailState {
    pub snapshot: TelemetrySnapshot,
    pub counts: EventCounts,
    /// Categories of the newest event
    pub recent: Vec<Category>,
    pub summary: StatusSummary,
    pub score: u8,
    pub score_band: ScoreBand,
    /// "42m" / "1h 5m" for an active session
    pub session_duration: Option<String>,
    /// An alert banner is showing
    pub alert_active: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl DetailState {
    pub fn build(snapshot: TelemetrySnapshot, alert_active: bool, now: DateTime<Utc>) -> Self {
        let counts = EventCounts::from_events(snapshot.session.as_ref(), &snapshot.events);
        let summary = classify(
            &snapshot.driver.name,
            &ClassifierInput::from_snapshot(&snapshot, counts),
        );
        let score = snapshot.effective_score();

        Self {
            counts,
            recent: recent_categories(&snapshot.events),
            summary,
            score,
            score_band: ScoreBand::of(score),
            session_duration: snapshot.session.as_ref().map(|s| s.duration_label(now)),
            alert_active,
            refreshed_at: now,
            snapshot,
        }
    }
}
