//! Driver Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use monitor::DetailState;
use safety_status::ScoreBand;
use serde::Serialize;
use storage::{fetch_snapshot, NewDriver};
use telemetry::Driver;
use uuid::Uuid;

use crate::{auth::AuthUser, ApiError, SharedState};

/// One roster row
#[derive(Debug, Serialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub driver: Driver,
    pub initials: String,
    pub online: bool,
    pub score_band: ScoreBand,
}

impl From<Driver> for RosterEntry {
    fn from(driver: Driver) -> Self {
        Self {
            initials: driver.initials(),
            online: driver.is_online(),
            score_band: ScoreBand::of(driver.safety_score),
            driver,
        }
    }
}

/// Response for the roster endpoint
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub data: Vec<RosterEntry>,
    pub count: usize,
    pub online_count: usize,
}

/// List all drivers
pub async fn list_drivers(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<RosterResponse>, ApiError> {
    let store = state.read().await.store.clone().for_user(&auth.token);
    let data: Vec<RosterEntry> = store
        .list_drivers()
        .await?
        .into_iter()
        .map(RosterEntry::from)
        .collect();

    Ok(Json(RosterResponse {
        count: data.len(),
        online_count: data.iter().filter(|d| d.online).count(),
        data,
    }))
}

/// Register a driver
pub async fn create_driver(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(new_driver): Json<NewDriver>,
) -> Result<(StatusCode, Json<Driver>), ApiError> {
    if new_driver.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if new_driver.hardware_id.trim().is_empty() {
        return Err(ApiError::BadRequest("arduino_id is required".to_string()));
    }

    let store = state.read().await.store.clone().for_user(&auth.token);
    let driver = store.insert_driver(new_driver).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

/// Driver detail: the mounted view's latest state, else a one-shot read.
/// A one-shot read never raises spoken alerts.
pub async fn get_driver(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<DetailState>, ApiError> {
    let (mounted, store) = {
        let state = state.read().await;
        let mounted = state.monitors.get(&driver_id).and_then(|m| m.current());
        (mounted, state.store.clone().for_user(&auth.token))
    };

    if let Some(detail) = mounted {
        return Ok(Json(detail));
    }

    let snapshot = fetch_snapshot(store.as_ref(), driver_id)
        .await
        .map_err(ApiError::for_driver(driver_id))?;
    Ok(Json(DetailState::build(snapshot, false, Utc::now())))
}
