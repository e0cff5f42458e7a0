//! Driver Safety Status
//!
//! Maps a session's safety score and event counts onto a severity tier with
//! a display color, an icon and a narrative sentence.

mod classifier;

pub use classifier::{
    classify, join_phrases, problem_phrase, ClassifierInput, ScoreBand, StatusColor, StatusIcon,
    StatusSummary, Tier,
};
