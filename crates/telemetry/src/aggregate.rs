//! Event aggregation
//!
//! Counts are always recomputed from the full event list of the current
//! session. Session-level running counters are never consulted.

use serde::{Deserialize, Serialize};

use crate::model::{Event, EventType, Session};

/// Semantic event category shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Swerving,
    HarshBrake,
    Aggressive,
    Distracted,
    /// DROWSY and EYES_CLOSED
    Drowsy,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Swerving,
        Category::HarshBrake,
        Category::Aggressive,
        Category::Distracted,
        Category::Drowsy,
    ];

    /// Map an event type onto the five-way taxonomy
    pub fn of(event_type: EventType) -> Option<Category> {
        match event_type {
            EventType::Swerving => Some(Category::Swerving),
            EventType::HarshBrake => Some(Category::HarshBrake),
            EventType::Aggressive => Some(Category::Aggressive),
            EventType::Distracted => Some(Category::Distracted),
            EventType::Drowsy | EventType::EyesClosed => Some(Category::Drowsy),
            EventType::Other => None,
        }
    }
}

/// Per-category event counts since session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub swerving: usize,
    pub harsh_brake: usize,
    pub aggressive: usize,
    pub distracted: usize,
    pub drowsy: usize,
}

impl EventCounts {
    /// Count events of the active session; all zero without one
    pub fn from_events(session: Option<&Session>, events: &[Event]) -> Self {
        let mut counts = Self::default();
        if session.is_none() {
            return counts;
        }

        for category in events.iter().filter_map(|e| Category::of(e.event_type)) {
            *counts.slot_mut(category) += 1;
        }
        counts
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Swerving => self.swerving,
            Category::HarshBrake => self.harsh_brake,
            Category::Aggressive => self.aggressive,
            Category::Distracted => self.distracted,
            Category::Drowsy => self.drowsy,
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Swerving => &mut self.swerving,
            Category::HarshBrake => &mut self.harsh_brake,
            Category::Aggressive => &mut self.aggressive,
            Category::Distracted => &mut self.distracted,
            Category::Drowsy => &mut self.drowsy,
        }
    }

    /// Sum over the five categories (excludes uncategorised events)
    pub fn categorized_total(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Categories with at least one event
    pub fn present(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.get(*c) > 0)
            .collect()
    }
}

/// Categories touched by the newest event (index 0 of a newest-first list)
pub fn recent_categories(events: &[Event]) -> Vec<Category> {
    events
        .first()
        .and_then(|e| Category::of(e.event_type))
        .into_iter()
        .collect()
}
