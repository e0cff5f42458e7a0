//! Spoken alert wording

use rand::seq::SliceRandom;
use safety_status::{join_phrases, problem_phrase};
use telemetry::{EventCounts, EventType};

/// Spoken summary of every category present in the session
pub fn critical_issue(counts: &EventCounts) -> String {
    let phrases: Vec<&str> = counts.present().into_iter().map(problem_phrase).collect();
    if phrases.is_empty() {
        return "Multiple critical safety violations".to_string();
    }

    let joined = join_phrases(&phrases);
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => format!("{}{} detected", first.to_uppercase(), chars.as_str()),
        None => joined,
    }
}

/// The three critical-alert variants
pub fn critical_messages(driver_name: &str, issue: &str) -> [String; 3] {
    [
        format!(
            "Critical alert! {} is driving dangerously. Immediate intervention required.",
            driver_name
        ),
        format!(
            "Warning! Unsafe driving detected. {}. Pull over immediately.",
            issue
        ),
        format!(
            "Danger! Critical safety violation. {} must stop driving now.",
            driver_name
        ),
    ]
}

/// One critical-alert variant chosen at random
pub fn critical_message(driver_name: &str, issue: &str) -> String {
    let variants = critical_messages(driver_name, issue);
    variants
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default()
}

pub fn warning_message(driver_name: &str) -> String {
    format!(
        "Attention! {} is showing concerning driving patterns. Monitor closely.",
        driver_name
    )
}

pub fn dangerous_event_message(event_type: EventType, driver_name: &str) -> String {
    match event_type {
        EventType::Drowsy | EventType::EyesClosed => format!(
            "Alert! {} is showing signs of drowsiness. Pull over immediately and rest.",
            driver_name
        ),
        EventType::HarshBrake => format!(
            "Warning! Harsh braking detected for {}. Maintain safe following distance.",
            driver_name
        ),
        EventType::Swerving => format!(
            "Alert! Erratic steering detected. {}, focus on the road.",
            driver_name
        ),
        EventType::Aggressive => format!(
            "Warning! Aggressive driving detected. {}, reduce speed and drive safely.",
            driver_name
        ),
        EventType::Distracted => format!(
            "Attention! {} appears distracted. Keep eyes on the road.",
            driver_name
        ),
        EventType::Other => format!(
            "Safety alert for {}. Please drive carefully.",
            driver_name
        ),
    }
}
