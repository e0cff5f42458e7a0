//! Supervisor profile rows

use tracing::info;

use crate::{StorageError, Supervisor, TelemetryStore, User};

/// Role given to every self-registered supervisor
pub const SUPERVISOR_ROLE: &str = "Fleet Supervisor";

/// Explicit name, else the name given at sign-up, else the email's local part
pub fn supervisor_name(user: &User, full_name: Option<&str>) -> String {
    full_name
        .or(user.user_metadata.full_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| {
            user.email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Supervisor".to_string())
}

/// Create the supervisor row for `user` unless one exists
pub async fn ensure_supervisor(
    store: &dyn TelemetryStore,
    user: &User,
    full_name: Option<&str>,
) -> Result<Supervisor, StorageError> {
    if let Some(existing) = store.get_supervisor(user.id).await? {
        return Ok(existing);
    }

    let supervisor = store
        .insert_supervisor(Supervisor {
            user_id: user.id,
            name: supervisor_name(user, full_name),
            email: user.email.clone(),
            role: SUPERVISOR_ROLE.to_string(),
        })
        .await?;
    info!("Created supervisor profile for {}", supervisor.name);
    Ok(supervisor)
}
