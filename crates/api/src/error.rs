//! API errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Errors returned by route handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Driver {0} not found")]
    DriverNotFound(Uuid),
    #[error("No detail view mounted for driver {0}")]
    NotMounted(Uuid),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Data store error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::DriverNotFound(_) | ApiError::NotMounted(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Map a missing row onto the driver it was looked up by
    pub fn for_driver(driver_id: Uuid) -> impl Fn(StorageError) -> ApiError {
        move |e| match e {
            StorageError::NotFound => ApiError::DriverNotFound(driver_id),
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors that stop the server from starting
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid rate limit configuration")]
    RateLimit,
    #[error("Failed to seed demo data: {0}")]
    DemoData(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
