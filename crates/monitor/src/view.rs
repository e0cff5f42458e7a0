//! Refresh loop for one mounted driver view

use alerting::{AlertConfig, AlertDispatcher};
use chrono::Utc;
use speech::Speaker;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{fetch_snapshot, StorageError, TelemetryStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DetailState, MonitorConfig};

/// State and alert policy of one driver detail view
pub struct DriverMonitor {
    driver_id: Uuid,
    store: Arc<dyn TelemetryStore>,
    dispatcher: AlertDispatcher,
    config: MonitorConfig,
    state_tx: Arc<watch::Sender<Option<DetailState>>>,
}

/// Last time the view was read through its handle
#[derive(Debug)]
struct Lease(Mutex<Instant>);

impl Lease {
    fn new() -> Self {
        Self(Mutex::new(Instant::now()))
    }

    fn renew(&self) {
        if let Ok(mut at) = self.0.lock() {
            *at = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.0.lock().map(|at| at.elapsed()).unwrap_or_default()
    }
}

impl DriverMonitor {
    pub fn new(
        driver_id: Uuid,
        store: Arc<dyn TelemetryStore>,
        speaker: Arc<dyn Speaker>,
        alerts: AlertConfig,
        config: MonitorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            driver_id,
            store,
            dispatcher: AlertDispatcher::new(speaker, alerts),
            config,
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn driver_id(&self) -> Uuid {
        self.driver_id
    }

    /// Run one cycle: fetch, derive, dispatch alerts, publish.
    /// On a failed fetch the last published state stays in place.
    pub async fn refresh(&mut self) -> Result<DetailState, StorageError> {
        let snapshot = match fetch_snapshot(self.store.as_ref(), self.driver_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::counter!("fleet_refresh_total", "outcome" => "error").increment(1);
                return Err(e);
            }
        };

        let mut state = DetailState::build(snapshot, false, Utc::now());
        let name = state.snapshot.driver.name.clone();

        // New-event announcement first so a tier alert is the one left audible
        self.dispatcher
            .observe_newest_event(&name, state.snapshot.events.first());
        let alert = self
            .dispatcher
            .evaluate(&name, state.summary.tier, &state.counts);
        if let Some(alert) = alert {
            debug!(
                "{} entered {} (spoken: {})",
                name,
                alert.tier.as_str(),
                alert.spoken
            );
        }
        state.alert_active = self.dispatcher.is_alert_active();

        self.state_tx.send_replace(Some(state.clone()));
        metrics::counter!("fleet_refresh_total", "outcome" => "ok").increment(1);
        Ok(state)
    }

    /// Latest published state
    pub fn current(&self) -> Option<DetailState> {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DetailState>> {
        self.state_tx.subscribe()
    }

    /// Start the refresh loop. The first cycle runs immediately.
    pub fn spawn(self) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let lease = Arc::new(Lease::new());
        let state_tx = self.state_tx.clone();
        let driver_id = self.driver_id;

        info!("Mounting detail view for driver {}", driver_id);
        let task = tokio::spawn(monitor_loop(self, cancel.clone(), lease.clone()));

        MonitorHandle {
            driver_id,
            cancel,
            state_tx,
            lease,
            task: Some(task),
        }
    }

    /// No subscriber and no read through the handle for the idle timeout
    fn is_abandoned(&self, lease: &Lease) -> bool {
        let Some(timeout) = self.config.idle_timeout() else {
            return false;
        };
        if self.state_tx.receiver_count() > 0 {
            lease.renew();
            return false;
        }
        lease.idle_for() >= timeout
    }

    fn teardown(&mut self) {
        self.dispatcher.teardown();
        info!("Detail view for driver {} unmounted", self.driver_id);
    }
}

async fn monitor_loop(mut monitor: DriverMonitor, cancel: CancellationToken, lease: Arc<Lease>) {
    let driver_id = monitor.driver_id;
    let mut ticker = tokio::time::interval(monitor.config.poll_interval());
    // A slow cycle delays the next one instead of overlapping it
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if monitor.is_abandoned(&lease) {
                    info!("Detail view for driver {} idle, unmounting", driver_id);
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = monitor.refresh() => {
                        if let Err(e) = result {
                            warn!("Refresh failed for driver {}: {}", driver_id, e);
                        }
                    }
                }
            }
        }
    }

    monitor.teardown();
}

/// Owner of a running detail view. Dropping it unmounts the view.
pub struct MonitorHandle {
    driver_id: Uuid,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<Option<DetailState>>>,
    lease: Arc<Lease>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn driver_id(&self) -> Uuid {
        self.driver_id
    }

    /// `None` until the first cycle succeeds. Keeps the view mounted.
    pub fn current(&self) -> Option<DetailState> {
        self.lease.renew();
        self.state_tx.borrow().clone()
    }

    /// The view stays mounted while any receiver is alive
    pub fn subscribe(&self) -> watch::Receiver<Option<DetailState>> {
        self.lease.renew();
        self.state_tx.subscribe()
    }

    /// Keep the view mounted for another idle period
    pub fn touch(&self) {
        self.lease.renew();
    }

    /// False once the view was cancelled or unmounted itself
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop the loop and wait for teardown to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Monitor task for driver {} failed: {}", self.driver_id, e);
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
