//! Fleet Safety Dashboard API Server
//!
//! REST and server-sent-event surface for the driver roster and the
//! per-driver detail views.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_governor::GovernorLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};
use uuid::Uuid;

mod auth;
pub mod config;
mod error;
pub mod rate_limit;
mod routes;

pub use crate::config::{AppConfig, LogFormat};
pub use crate::error::{ApiError, ServerError};

use alerting::AlertConfig;
use monitor::{MonitorConfig, MonitorHandle};
use speech::{Speaker, SpeechDelivery};
use storage::{
    AuthProvider, InMemoryStore, SupabaseClient, TelemetryStore, DEMO_EMAIL, DEMO_PASSWORD,
    DEMO_TOKEN,
};

/// Shared handle passed to every handler
pub type SharedState = Arc<RwLock<AppState>>;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub speaker: Arc<dyn Speaker>,
    /// Mounted detail views by driver
    pub monitors: HashMap<Uuid, MonitorHandle>,
    pub alerts: AlertConfig,
    pub monitor_config: MonitorConfig,
    /// "supabase" or "memory"
    pub backend: &'static str,
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        auth: Arc<dyn AuthProvider>,
        speaker: Arc<dyn Speaker>,
        backend: &'static str,
    ) -> Self {
        Self {
            store,
            auth,
            speaker,
            monitors: HashMap::new(),
            alerts: AlertConfig::default(),
            monitor_config: MonitorConfig::default(),
            backend,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Wire collaborators from configuration. Without a hosted backend
    /// the state runs on seeded in-memory data.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServerError> {
        let speaker: Arc<dyn Speaker> = Arc::new(SpeechDelivery::from_config(&config.speech));

        let mut state = match config.supabase() {
            Some(supabase) => {
                info!("Using Supabase backend at {}", supabase.url);
                let client = Arc::new(SupabaseClient::new(&supabase));
                Self::new(client.clone(), client, speaker, "supabase")
            }
            None => {
                warn!(
                    "No Supabase credentials configured, serving demo data \
                     (token: {}, sign-in: {} / {})",
                    DEMO_TOKEN, DEMO_EMAIL, DEMO_PASSWORD
                );
                let store = Arc::new(InMemoryStore::with_demo_data()?);
                Self::new(store.clone(), store, speaker, "memory")
            }
        };

        state.alerts = config.alerts.clone();
        state.monitor_config = config.monitor.clone();
        Ok(state)
    }

    /// Drop handles of views that stopped on their own; returns how many
    pub fn reap_unmounted(&mut self) -> usize {
        let before = self.monitors.len();
        self.monitors.retain(|_, handle| handle.is_running());
        let reaped = before - self.monitors.len();
        if reaped > 0 {
            debug!("Reaped {} idle detail views", reaped);
        }
        reaped
    }
}

/// Periodically forget detail views that unmounted themselves
pub fn spawn_view_reaper(state: SharedState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            state.write().await.reap_unmounted();
        }
    })
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: String,
    pub mounted_views: usize,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/drivers",
            get(routes::drivers::list_drivers).post(routes::drivers::create_driver),
        )
        .route("/api/v1/drivers/:id", get(routes::drivers::get_driver))
        .route(
            "/api/v1/drivers/:id/monitor",
            post(routes::monitor::mount).delete(routes::monitor::unmount),
        )
        .route("/api/v1/drivers/:id/stream", get(routes::monitor::stream))
        .route("/api/v1/auth/signin", post(routes::auth::sign_in))
        .route("/api/v1/auth/signup", post(routes::auth::sign_up))
        .route("/api/v1/auth/signout", post(routes::auth::sign_out))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backend: state.backend.to_string(),
        mounted_views: state.monitors.len(),
    })
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.read().await.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Initialize logging. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

/// Run the server until it fails
pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    let mut state = AppState::from_config(&config)?;
    state.metrics = install_metrics();

    let governor = rate_limit::create_governor_config(&config.server.rate_limit)
        .ok_or(ServerError::RateLimit)?;
    let state = Arc::new(RwLock::new(state));
    let reaper = spawn_view_reaper(state.clone(), config.monitor.poll_interval());
    let app = create_router(state).layer(GovernorLayer { config: governor });

    let addr = config.server.addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await;
    reaper.abort();
    served?;

    Ok(())
}
