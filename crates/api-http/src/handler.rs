//! HTTP Handlers
//!
//! Thin translation between HTTP and the queue service / summary feed.

use crate::error::ApiError;
use crate::types::{
    HealthResponse, JoinResponse, LeaveResponse, PositionResponse, QueueRequest, WelcomeResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use callq_core::application::{AggregationCache, BroadcastHub, QueueService};
use callq_core::domain::{AggregationSnapshot, DomainError, PhoneNumber, QueueName, SummaryMessage};
use callq_core::error::Result as AppResult;
use futures::{Future, Stream, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const SERVICE_NAME: &str = "callq";
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueueService>,
    pub cache: Arc<AggregationCache>,
    pub hub: BroadcastHub,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<QueueService>, cache: Arc<AggregationCache>, hub: BroadcastHub) -> Self {
        Self {
            service,
            cache,
            hub,
            started_at: Instant::now(),
        }
    }
}

/// GET /
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the callq queue position service.".to_string(),
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: callq_core::VERSION.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        subscribers: state.hub.subscriber_count(),
    })
}

/// POST /queue/increment
pub async fn join_queue(
    State(state): State<AppState>,
    payload: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ApiError> {
    let Json(req) = payload?;
    let (phone_number, queue_name) = req.parse()?;

    let service = Arc::clone(&state.service);
    let entry = run_detached(async move { service.join(&phone_number, &queue_name).await }).await?;
    Ok(Json(JoinResponse {
        position: entry.position,
    }))
}

/// POST /queue/decrement
pub async fn leave_queue(
    State(state): State<AppState>,
    payload: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<Json<LeaveResponse>, ApiError> {
    let Json(req) = payload?;
    let (phone_number, queue_name) = req.parse()?;

    let service = Arc::clone(&state.service);
    run_detached(async move { service.leave(&phone_number, &queue_name).await }).await?;
    Ok(Json(LeaveResponse {}))
}

/// Run a store mutation on its own task.
///
/// The mutation finishes even if the client disconnects and axum drops the
/// handler future.
async fn run_detached<T, F>(operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::internal(format!("Queue operation task failed: {}", e))),
    }
}

/// GET /queue/:queue_name/:phone_number
pub async fn get_position(
    State(state): State<AppState>,
    Path((queue_name, phone_number)): Path<(String, String)>,
) -> Result<Json<PositionResponse>, ApiError> {
    let queue_name = QueueName::parse(&queue_name)?;
    let phone_number = PhoneNumber::parse(&phone_number)?;

    match state.service.position(&phone_number, &queue_name).await? {
        Some(position) => Ok(Json(PositionResponse {
            phone_number: phone_number.to_string(),
            queue_name: queue_name.to_string(),
            position,
        })),
        None => Err(DomainError::NotInQueue {
            phone_number: phone_number.to_string(),
            queue_name: queue_name.to_string(),
        }
        .into()),
    }
}

/// GET /queues/summary
///
/// Last snapshot the publisher computed; `{}` before the first tick.
pub async fn summary(State(state): State<AppState>) -> Json<AggregationSnapshot> {
    Json(state.cache.latest().await.unwrap_or_default())
}

/// GET /stream/queues/summary
///
/// One `data:` event per tick. A new subscriber is primed with the cached
/// snapshot so it does not wait a full tick for its first message.
pub async fn stream_summary(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let initial = state.cache.latest().await.map(SummaryMessage::from);
    let subscription = state.hub.subscribe_primed(initial);
    debug!(subscriber = subscription.id(), "Summary stream opened");

    let events = subscription.map(|msg| Event::default().json_data(&msg));
    Sse::new(events).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
}
