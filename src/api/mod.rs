mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::contracts::env::parse_or_default;
use crate::contracts::TrackingIdAllocator;

pub use handlers::{
    ApiError, AppState, ErrorResponse, IssueTrackingIdResponse, ReadinessResponse, StatsResponse,
    TrackingIdDetails, DEFAULT_REQUEST_TIMEOUT,
};

/// Creates the API router.
pub fn create_router<A: TrackingIdAllocator + 'static>(state: Arc<AppState<A>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_ready::<A>))
        .route("/stats", get(handlers::get_stats::<A>))
        .route("/metrics", get(handlers::metrics::<A>))
        .route("/tracking-ids", post(handlers::issue_tracking_id::<A>))
        .route("/tracking-ids/:id", get(handlers::parse_tracking_id::<A>))
        .route("/sequences/today", get(handlers::get_today_sequence::<A>))
        .route("/sequences/:date", get(handlers::get_sequence::<A>))
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on one allocation made through the API
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Reads `TRACKSEQ_HOST`, `TRACKSEQ_PORT` and `TRACKSEQ_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let default = Self::default();
        let timeout_ms = parse_or_default(
            "TRACKSEQ_REQUEST_TIMEOUT_MS",
            std::env::var("TRACKSEQ_REQUEST_TIMEOUT_MS").ok(),
            default.request_timeout.as_millis() as u64,
        );
        Self {
            host: std::env::var("TRACKSEQ_HOST").unwrap_or(default.host),
            port: parse_or_default(
                "TRACKSEQ_PORT",
                std::env::var("TRACKSEQ_PORT").ok(),
                default.port,
            ),
            request_timeout: if timeout_ms == 0 {
                default.request_timeout
            } else {
                Duration::from_millis(timeout_ms)
            },
        }
    }
}

/// Starts the HTTP server.
pub async fn start_server<A, F>(
    config: ServerConfig,
    state: Arc<AppState<A>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    A: TrackingIdAllocator + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
