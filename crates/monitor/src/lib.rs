//! Driver Detail Monitor
//!
//! One mounted detail view per driver. Each refresh cycle reads the
//! driver's telemetry, derives counts and status, and runs the alert
//! dispatcher. Results are published over a watch channel. A view nobody
//! reads or subscribes to for `idle_timeout_ms` unmounts itself.

mod state;
mod view;

pub use view::{DriverMonitor, MonitorHandle};
pub use state::DetailState;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Refresh loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between refresh cycles (ms)
    pub poll_interval_ms: u64,
    /// Unmount after this long without readers or subscribers (ms); 0 never
    pub idle_timeout_ms: u64,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            idle_timeout_ms: 30_000,
        }
    }
}
