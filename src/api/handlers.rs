use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::contracts::{
    AllocatorError, AllocatorKind, DateKey, DaySequence, ParseError, StoreInfo, TrackingId,
    TrackingIdAllocator,
};
use crate::metrics::AllocatorMetrics;

/// Default upper bound on one `generate()` call made through the API.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Application state shared across handlers.
pub struct AppState<A: TrackingIdAllocator> {
    pub allocator: Arc<A>,
    pub metrics: Arc<AllocatorMetrics>,
    /// Backing store description for `/stats`; `None` in in-memory mode
    pub store_info: Option<StoreInfo>,
    /// Request-level timeout around `generate()`
    pub request_timeout: Duration,
}

impl<A: TrackingIdAllocator> AppState<A> {
    pub fn new(allocator: Arc<A>, store_info: Option<StoreInfo>) -> Self {
        Self {
            allocator,
            metrics: Arc::new(AllocatorMetrics::new()),
            store_info,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    Allocator(AllocatorError),
    InvalidTrackingId(ParseError),
    InvalidDate(ParseError),
    SequenceNotFound(DateKey),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error) = match self {
            ApiError::Allocator(e @ AllocatorError::StorageUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.code(), e.to_string())
            }
            ApiError::Allocator(e @ AllocatorError::MalformedState { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.code(), e.to_string())
            }
            ApiError::InvalidTrackingId(e) => {
                (StatusCode::BAD_REQUEST, "INVALID_TRACKING_ID", e.to_string())
            }
            ApiError::InvalidDate(e) => (StatusCode::BAD_REQUEST, "INVALID_DATE", e.to_string()),
            ApiError::SequenceNotFound(date) => (
                StatusCode::NOT_FOUND,
                "SEQUENCE_NOT_FOUND",
                format!("No tracking ids issued for {}", date),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.into(),
            }),
        )
            .into_response()
    }
}

impl From<AllocatorError> for ApiError {
    fn from(e: AllocatorError) -> Self {
        ApiError::Allocator(e)
    }
}

/// Response for a newly issued identifier.
#[derive(Debug, Serialize)]
pub struct IssueTrackingIdResponse {
    pub tracking_id: TrackingId,
    pub date: DateKey,
    pub counter: u64,
}

/// POST /tracking-ids
/// Issue the next tracking id for today.
pub async fn issue_tracking_id<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
) -> Result<(StatusCode, Json<IssueTrackingIdResponse>), ApiError> {
    let start = Instant::now();

    let result = match tokio::time::timeout(state.request_timeout, state.allocator.generate()).await
    {
        Ok(result) => result,
        Err(_) => Err(AllocatorError::StorageUnavailable(format!(
            "allocation timed out after {}ms",
            state.request_timeout.as_millis()
        ))),
    };

    match result {
        Ok(id) => {
            state
                .metrics
                .record_issued(id.counter(), start.elapsed().as_micros() as u64);
            Ok((
                StatusCode::CREATED,
                Json(IssueTrackingIdResponse {
                    date: id.date(),
                    counter: id.counter(),
                    tracking_id: id,
                }),
            ))
        }
        Err(e) => {
            state.metrics.record_failure(&e);
            tracing::warn!(error = %e, code = e.code(), "Tracking id request failed");
            Err(e.into())
        }
    }
}

/// Response describing a parsed identifier.
#[derive(Debug, Serialize)]
pub struct TrackingIdDetails {
    pub tracking_id: TrackingId,
    pub prefix: String,
    pub date: DateKey,
    pub counter: u64,
    /// Whether the prefix matches this deployment's brand code
    pub prefix_matches: bool,
}

/// GET /tracking-ids/{id}
/// Validate an identifier and split it into its parts.
pub async fn parse_tracking_id<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
    Path(raw): Path<String>,
) -> Result<Json<TrackingIdDetails>, ApiError> {
    let id: TrackingId = raw.trim().parse().map_err(ApiError::InvalidTrackingId)?;
    Ok(Json(TrackingIdDetails {
        prefix: id.prefix().to_string(),
        date: id.date(),
        counter: id.counter(),
        prefix_matches: id.prefix() == state.allocator.prefix(),
        tracking_id: id,
    }))
}

/// GET /sequences/{date}
/// Current counter for a date, without incrementing it.
pub async fn get_sequence<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
    Path(raw): Path<String>,
) -> Result<Json<DaySequence>, ApiError> {
    let date: DateKey = raw.parse().map_err(ApiError::InvalidDate)?;
    lookup_sequence(&state, date).await
}

/// GET /sequences/today
pub async fn get_today_sequence<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
) -> Result<Json<DaySequence>, ApiError> {
    let date = state.allocator.today();
    lookup_sequence(&state, date).await
}

async fn lookup_sequence<A: TrackingIdAllocator>(
    state: &AppState<A>,
    date: DateKey,
) -> Result<Json<DaySequence>, ApiError> {
    state
        .allocator
        .current(date)
        .await?
        .map(Json)
        .ok_or(ApiError::SequenceNotFound(date))
}

/// GET /health
/// GET /health/live
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Response for readiness endpoint.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub allocator: AllocatorKind,
    pub store: ComponentHealth,
}

/// Health status for a single component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health/ready
/// Ready when the backing store answers. In-memory mode is always ready.
pub async fn health_ready<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let kind = state.allocator.kind();
    let ping = tokio::time::timeout(state.request_timeout, state.allocator.ping()).await;

    let store = match (kind, ping) {
        (AllocatorKind::InMemory, _) => ComponentHealth {
            status: "not_configured".into(),
            error: None,
        },
        (_, Ok(Ok(()))) => ComponentHealth {
            status: "ok".into(),
            error: None,
        },
        (_, Ok(Err(e))) => ComponentHealth {
            status: "error".into(),
            error: Some(e.to_string()),
        },
        (_, Err(_)) => ComponentHealth {
            status: "error".into(),
            error: Some("ping timed out".into()),
        },
    };

    let ready = store.error.is_none();
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.into(),
        allocator: kind,
        store,
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub allocator: AllocatorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreInfo>,
    pub prefix: String,
    pub today: DateKey,
    pub issued: IssuedStats,
    pub failures: FailureStats,
}

#[derive(Debug, Serialize)]
pub struct IssuedStats {
    pub total: u64,
    pub rate_per_sec: f64,
    pub avg_latency_us: f64,
}

#[derive(Debug, Serialize)]
pub struct FailureStats {
    pub storage_unavailable: u64,
    pub malformed_state: u64,
    pub conflict_retries: u64,
}

/// GET /stats
pub async fn get_stats<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
) -> impl IntoResponse {
    let metrics = &state.metrics;
    metrics.set_conflict_retries(state.allocator.conflict_retries());
    let uptime_secs = metrics.uptime_secs();
    let issued_total = metrics.issued_total.load(Ordering::Relaxed);

    Json(StatsResponse {
        uptime_secs,
        allocator: state.allocator.kind(),
        store: state.store_info.clone(),
        prefix: state.allocator.prefix().to_string(),
        today: state.allocator.today(),
        issued: IssuedStats {
            total: issued_total,
            rate_per_sec: safe_rate(issued_total, uptime_secs),
            avg_latency_us: metrics.generate_latency_us.mean(),
        },
        failures: FailureStats {
            storage_unavailable: metrics.storage_unavailable_total.load(Ordering::Relaxed),
            malformed_state: metrics.malformed_state_total.load(Ordering::Relaxed),
            conflict_retries: metrics.conflict_retries_total.load(Ordering::Relaxed),
        },
    })
}

/// GET /metrics
/// Prometheus text exposition format.
pub async fn metrics<A: TrackingIdAllocator>(
    State(state): State<Arc<AppState<A>>>,
) -> impl IntoResponse {
    state
        .metrics
        .set_conflict_retries(state.allocator.conflict_retries());
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.format_prometheus(),
    )
}

fn safe_rate(count: u64, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        count as f64 / duration_secs
    } else {
        0.0
    }
}
