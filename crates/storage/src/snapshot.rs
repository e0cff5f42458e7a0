//! One refresh cycle's reads

use telemetry::TelemetrySnapshot;
use tracing::debug;
use uuid::Uuid;

use crate::{StorageError, TelemetryStore};

/// Read driver, newest active session and that session's events, in that
/// order. Any failed read fails the whole snapshot.
pub async fn fetch_snapshot(
    store: &dyn TelemetryStore,
    driver_id: Uuid,
) -> Result<TelemetrySnapshot, StorageError> {
    let driver = store.get_driver(driver_id).await?;
    let session = store.latest_active_session(driver_id).await?;
    let events = match &session {
        Some(session) => store.session_events(session.id).await?,
        None => Vec::new(),
    };

    debug!(
        "Snapshot for {}: session={} events={}",
        driver.name,
        session.is_some(),
        events.len()
    );

    Ok(TelemetrySnapshot {
        driver,
        session,
        events,
    })
}
