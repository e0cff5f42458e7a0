//! Status Classifier Implementation

use serde::{Deserialize, Serialize};
use telemetry::{Category, EventCounts, TelemetrySnapshot};

/// Per-category count a warning-tier driver must exceed to be listed
const HARSH_BRAKE_LIMIT: usize = 2;
const SWERVING_LIMIT: usize = 2;
const AGGRESSIVE_LIMIT: usize = 2;
const DISTRACTED_LIMIT: usize = 2;
const DROWSY_LIMIT: usize = 0;

/// Severity tier of a driver's current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// No active session
    Info,
    Excellent,
    Good,
    Warning,
    Critical,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Info => "info",
            Tier::Excellent => "excellent",
            Tier::Good => "good",
            Tier::Warning => "warning",
            Tier::Critical => "critical",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            Tier::Info => StatusColor::Blue,
            Tier::Excellent => StatusColor::Green,
            Tier::Good => StatusColor::Teal,
            Tier::Warning => StatusColor::Yellow,
            Tier::Critical => StatusColor::Red,
        }
    }

    pub fn icon(&self) -> StatusIcon {
        match self {
            Tier::Info => StatusIcon::Info,
            Tier::Excellent => StatusIcon::CheckCircle,
            Tier::Good => StatusIcon::ThumbsUp,
            Tier::Warning => StatusIcon::AlertTriangle,
            Tier::Critical => StatusIcon::AlertOctagon,
        }
    }
}

/// Display color selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Blue,
    Green,
    Teal,
    Yellow,
    Red,
}

/// Display icon selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusIcon {
    Info,
    CheckCircle,
    ThumbsUp,
    AlertTriangle,
    AlertOctagon,
}

/// Coarse band for score bars and roster badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        if score >= 90 {
            ScoreBand::Good
        } else if score >= 75 {
            ScoreBand::Fair
        } else {
            ScoreBand::Poor
        }
    }
}

/// Classifier input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierInput {
    /// Session score, or the driver's score without one
    pub score: u8,
    pub counts: EventCounts,
    /// All events of the session, categorised or not
    pub total_events: usize,
    pub has_session: bool,
}

impl ClassifierInput {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, counts: EventCounts) -> Self {
        Self {
            score: snapshot.effective_score(),
            counts,
            total_events: snapshot.total_events(),
            has_session: snapshot.has_session(),
        }
    }
}

/// Derived status; recomputed every refresh, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub tier: Tier,
    pub color: StatusColor,
    pub icon: StatusIcon,
    /// Categories named in the message (warning and critical only)
    pub problems: Vec<Category>,
    pub message: String,
}

/// Human-readable phrase for a category
pub fn problem_phrase(category: Category) -> &'static str {
    match category {
        Category::HarshBrake => "harsh braking",
        Category::Swerving => "swerving",
        Category::Aggressive => "aggressive driving",
        Category::Distracted => "distraction",
        Category::Drowsy => "drowsiness",
    }
}

/// "a", "a and b", "a, b and c"
pub fn join_phrases(phrases: &[&str]) -> String {
    match phrases {
        [] => String::new(),
        [only] => (*only).to_string(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

/// Listing order used in narratives and speech
const PROBLEM_ORDER: [Category; 5] = [
    Category::HarshBrake,
    Category::Swerving,
    Category::Aggressive,
    Category::Distracted,
    Category::Drowsy,
];

fn limit(category: Category) -> usize {
    match category {
        Category::HarshBrake => HARSH_BRAKE_LIMIT,
        Category::Swerving => SWERVING_LIMIT,
        Category::Aggressive => AGGRESSIVE_LIMIT,
        Category::Distracted => DISTRACTED_LIMIT,
        Category::Drowsy => DROWSY_LIMIT,
    }
}

fn problems_where(
    counts: &EventCounts,
    include: impl Fn(Category, usize) -> bool,
) -> Vec<Category> {
    PROBLEM_ORDER
        .iter()
        .copied()
        .filter(|c| include(*c, counts.get(*c)))
        .collect()
}

fn describe(problems: &[Category], fallback: &str) -> String {
    if problems.is_empty() {
        fallback.to_string()
    } else {
        let phrases: Vec<&str> = problems.iter().map(|c| problem_phrase(*c)).collect();
        join_phrases(&phrases)
    }
}

/// Classify a driver's current state. First matching rule wins.
pub fn classify(driver_name: &str, input: &ClassifierInput) -> StatusSummary {
    let name = driver_name.split_whitespace().next().unwrap_or(driver_name);
    let score = input.score;
    let total = input.total_events;

    let (tier, problems, message) = if !input.has_session {
        (
            Tier::Info,
            Vec::new(),
            format!("{} is not on an active driving session.", name),
        )
    } else if score >= 90 && total <= 2 {
        (
            Tier::Excellent,
            Vec::new(),
            format!(
                "{} is driving excellently with a safety score of {}%. Keep it up!",
                name, score
            ),
        )
    } else if score >= 80 && total <= 5 {
        (
            Tier::Good,
            Vec::new(),
            format!(
                "{} is driving safely with a safety score of {}%. Only minor issues detected.",
                name, score
            ),
        )
    } else if score >= 70 || total <= 10 {
        // OR is intentional: a low score with few events stays at warning
        let problems = problems_where(&input.counts, |c, n| n > limit(c));
        let message = format!(
            "{} needs attention: {}. Safety score is {}%.",
            name,
            describe(&problems, "multiple safety concerns"),
            score
        );
        (Tier::Warning, problems, message)
    } else {
        let problems = problems_where(&input.counts, |_, n| n > 0);
        let message = format!(
            "{} is driving dangerously: {}. Safety score has dropped to {}%. Immediate intervention recommended.",
            name,
            describe(&problems, "multiple critical safety violations"),
            score
        );
        (Tier::Critical, problems, message)
    };

    StatusSummary {
        tier,
        color: tier.color(),
        icon: tier.icon(),
        problems,
        message,
    }
}
