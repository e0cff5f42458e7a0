//! Alerting System
//!
//! Decides when a driver's status deserves a spoken alert:
//! - Edge-triggered alerts on transitions into warning or critical
//! - Per-type cooldown so the same alert never repeats within the window
//! - Announcements for newly arrived dangerous events

mod cooldown;
mod dispatcher;
pub mod messages;

pub use cooldown::{AlertConfig, AlertState, CooldownGate};
pub use dispatcher::{AlertDispatcher, TierAlert};
