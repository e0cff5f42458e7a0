//! Detail View Routes
//!
//! Mounting a driver's detail view starts its refresh loop and spoken
//! alerts; unmounting tears both down. A view that nobody reads or
//! streams unmounts itself after the idle timeout and is reaped.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    Json,
};
use monitor::DriverMonitor;
use serde::Serialize;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use crate::{auth::AuthUser, ApiError, SharedState};

/// Response for the mount endpoint
#[derive(Debug, Serialize)]
pub struct MountResponse {
    pub driver_id: Uuid,
    pub poll_interval_ms: u64,
    /// False when the view was already mounted
    pub mounted: bool,
}

/// Mount a driver's detail view
pub async fn mount(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(driver_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MountResponse>), ApiError> {
    // The view reads as the supervisor who opened it
    let store = state.read().await.store.clone().for_user(&auth.token);
    store
        .get_driver(driver_id)
        .await
        .map_err(ApiError::for_driver(driver_id))?;

    let mut state = state.write().await;
    state.reap_unmounted();
    let poll_interval_ms = state.monitor_config.poll_interval_ms;

    if let Some(existing) = state.monitors.get(&driver_id) {
        existing.touch();
        return Ok((
            StatusCode::OK,
            Json(MountResponse {
                driver_id,
                poll_interval_ms,
                mounted: false,
            }),
        ));
    }

    let handle = DriverMonitor::new(
        driver_id,
        store,
        state.speaker.clone(),
        state.alerts.clone(),
        state.monitor_config.clone(),
    )
    .spawn();
    state.monitors.insert(driver_id, handle);
    info!("Supervisor {} opened driver {}", auth.user.id, driver_id);

    Ok((
        StatusCode::CREATED,
        Json(MountResponse {
            driver_id,
            poll_interval_ms,
            mounted: true,
        }),
    ))
}

/// Unmount a driver's detail view, silencing any speech in progress
pub async fn unmount(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(driver_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let handle = state
        .write()
        .await
        .monitors
        .remove(&driver_id)
        .ok_or(ApiError::NotMounted(driver_id))?;

    handle.shutdown().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Push every new detail state of a mounted view. The view stays mounted
/// while the stream is open.
pub async fn stream(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(driver_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>, ApiError> {
    let rx = state
        .read()
        .await
        .monitors
        .get(&driver_id)
        .map(|m| m.subscribe())
        .ok_or(ApiError::NotMounted(driver_id))?;

    let updates = WatchStream::new(rx).filter_map(|detail| {
        detail.map(|detail| SseEvent::default().event("detail").json_data(&detail))
    });

    Ok(Sse::new(updates).keep_alive(KeepAlive::default()))
}
