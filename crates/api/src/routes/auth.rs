//! Session Routes
//!
//! Password sign-in and sign-up for supervisors. Both make sure the
//! supervisor has a profile row; a failure there is logged and does not
//! fail the request.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{ensure_supervisor, AuthSession, TelemetryStore, User};
use tracing::{info, warn};

use crate::{auth::AuthUser, ApiError, SharedState};

/// Body of the sign-in endpoint
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Body of the sign-up endpoint
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Response for the sign-up endpoint
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user: User,
    pub session: Option<AuthSession>,
    /// The account must confirm its email before signing in
    pub confirmation_required: bool,
}

fn validate(email: &str, password: &str) -> Result<(), ApiError> {
    if !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    Ok(())
}

async fn register_supervisor(
    store: Arc<dyn TelemetryStore>,
    user: &User,
    full_name: Option<&str>,
) {
    if let Err(e) = ensure_supervisor(store.as_ref(), user, full_name).await {
        warn!("Failed to ensure supervisor profile for {}: {}", user.id, e);
    }
}

/// Sign a supervisor in with email and password
pub async fn sign_in(
    State(state): State<SharedState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let email = request.email.trim();
    validate(email, &request.password)?;

    let (auth, store) = {
        let state = state.read().await;
        (state.auth.clone(), state.store.clone())
    };

    let session = auth
        .sign_in(email, &request.password)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    register_supervisor(store.for_user(&session.access_token), &session.user, None).await;
    info!("Supervisor {} signed in", session.user.id);
    Ok(Json(session))
}

/// Register a supervisor account
pub async fn sign_up(
    State(state): State<SharedState>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), ApiError> {
    let email = request.email.trim();
    validate(email, &request.password)?;
    let full_name = request
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let (auth, store) = {
        let state = state.read().await;
        (state.auth.clone(), state.store.clone())
    };

    let created = auth.sign_up(email, &request.password, full_name).await?;
    let store = match &created.session {
        Some(session) => store.for_user(&session.access_token),
        None => store,
    };
    register_supervisor(store, &created.user, full_name).await;
    info!("Supervisor account {} created", created.user.id);

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            confirmation_required: created.session.is_none(),
            user: created.user,
            session: created.session,
        }),
    ))
}

/// Sign the supervisor out
pub async fn sign_out(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let provider = state.read().await.auth.clone();
    provider.sign_out(&auth.token).await?;
    info!("Supervisor {} signed out", auth.user.id);
    Ok(StatusCode::NO_CONTENT)
}
