//! Per-key alert cooldown

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Alert timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum gap between two alerts with the same key (ms)
    pub cooldown_ms: u64,
    /// How long the alert-active flag stays up after a critical transition (ms)
    pub critical_hold_ms: u64,
    /// How long the alert-active flag stays up after a warning transition (ms)
    pub warning_hold_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 10_000,
            critical_hold_ms: 6_000,
            warning_hold_ms: 4_000,
        }
    }
}

/// State of one alert key
#[derive(Debug, Clone)]
pub struct AlertState {
    /// Last time this key fired
    pub last_fired: Instant,
    /// Number of times fired since the gate was created or cleared
    pub fire_count: usize,
}

/// Cooldown table keyed by alert type
///
/// Keys are event wire names (`DROWSY`, `HARSH_BRAKE`, ...) or the
/// literals `critical` / `warning`.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    states: HashMap<String, AlertState>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            states: HashMap::new(),
        }
    }

    /// Record and allow the alert unless `key` fired within the cooldown.
    /// Suppressed calls leave the table untouched.
    pub fn try_fire(&mut self, key: &str) -> bool {
        let now = Instant::now();

        if let Some(state) = self.states.get_mut(key) {
            if now.duration_since(state.last_fired) < self.cooldown {
                debug!("Alert {} suppressed: in cooldown period", key);
                return false;
            }
            state.last_fired = now;
            state.fire_count += 1;
            info!("Alert recorded: {} (count: {})", key, state.fire_count);
            return true;
        }

        self.states.insert(
            key.to_string(),
            AlertState {
                last_fired: now,
                fire_count: 1,
            },
        );
        info!("Alert recorded: {} (count: 1)", key);
        true
    }

    pub fn fire_count(&self, key: &str) -> usize {
        self.states.get(key).map_or(0, |s| s.fire_count)
    }

    /// Forget every key
    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(AlertConfig::default().cooldown_ms))
    }
}
