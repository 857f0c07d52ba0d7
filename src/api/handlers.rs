//! HTTP endpoint handlers
//!
//! Thin adapters: each handler forwards to the registry, the idle handle or
//! the coordinator and reports what happened.

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{debug, info};

use super::responses::{
    BulkResponse, HealthResponse, RegisterRequest, SignalResponse, StatusResponse, TimerResponse,
    VisibilityRequest,
};
use crate::state::{AppState, TimerReading};

fn reading_or_404(state: &AppState, timer_id: &str) -> Result<TimerReading, StatusCode> {
    state.registry.reading(timer_id).ok_or_else(|| {
        debug!("Timer {} not found", timer_id);
        StatusCode::NOT_FOUND
    })
}

fn signal_response(state: &AppState) -> Json<SignalResponse> {
    let snapshot = state.idle.snapshot();
    Json(SignalResponse {
        accepted: true,
        phase: snapshot.phase,
        tab_visible: snapshot.tab_visible,
    })
}

/// Handle POST /timers - Register a timer
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TimerResponse>), StatusCode> {
    if request.spec.timer_id.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let timer_id = request.spec.timer_id.clone();
    let created = state.registry.register(request.spec, request.initial);
    let reading = reading_or_404(&state, &timer_id)?;

    let (code, message) = if created {
        (StatusCode::CREATED, format!("Timer {} registered", timer_id))
    } else {
        (StatusCode::OK, format!("Timer {} already registered", timer_id))
    };
    Ok((code, Json(TimerResponse::new(message, created, Some(reading)))))
}

/// Handle GET /timers - Readings for every timer
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TimerReading>> {
    Json(state.registry.readings())
}

/// Handle GET /timers/:timer_id - Reading for one timer
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(timer_id): Path<String>,
) -> Result<Json<TimerReading>, StatusCode> {
    reading_or_404(&state, &timer_id).map(Json)
}

/// Handle DELETE /timers/:timer_id - Unregister a completed or deleted timer
pub async fn unregister_handler(
    State(state): State<Arc<AppState>>,
    Path(timer_id): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    if !state.registry.unregister(&timer_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(TimerResponse::new(
        format!("Timer {} unregistered", timer_id),
        true,
        None,
    )))
}

/// Handle POST /timers/:timer_id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(timer_id): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    reading_or_404(&state, &timer_id)?;
    let changed = state.registry.pause(&timer_id);
    let message = if changed {
        format!("Timer {} paused", timer_id)
    } else {
        format!("Timer {} was already paused", timer_id)
    };
    let reading = reading_or_404(&state, &timer_id)?;
    Ok(Json(TimerResponse::new(message, changed, Some(reading))))
}

/// Handle POST /timers/:timer_id/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(timer_id): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    reading_or_404(&state, &timer_id)?;
    let changed = state.registry.resume(&timer_id);
    let message = if changed {
        format!("Timer {} resumed", timer_id)
    } else {
        format!("Timer {} was already running", timer_id)
    };
    let reading = reading_or_404(&state, &timer_id)?;
    Ok(Json(TimerResponse::new(message, changed, Some(reading))))
}

/// Handle POST /bulk/pause
pub async fn pause_all_handler(State(state): State<Arc<AppState>>) -> Json<BulkResponse> {
    let changed = state.registry.pause_all();
    Json(BulkResponse::new("Paused all timers".to_string(), changed))
}

/// Handle POST /bulk/resume
pub async fn resume_all_handler(State(state): State<Arc<AppState>>) -> Json<BulkResponse> {
    let changed = state.registry.resume_all();
    Json(BulkResponse::new("Resumed all timers".to_string(), changed))
}

/// Handle POST /users/:user_id/pause - Timers the user owns or is assigned
pub async fn pause_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<BulkResponse> {
    let changed = state.registry.pause_by_owner(&user_id);
    Json(BulkResponse::new(format!("Paused timers for {}", user_id), changed))
}

/// Handle POST /users/:user_id/resume
pub async fn resume_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<BulkResponse> {
    let changed = state.registry.resume_by_owner(&user_id);
    Json(BulkResponse::new(format!("Resumed timers for {}", user_id), changed))
}

/// Handle POST /presence - Pointer, keyboard or touch activity
pub async fn presence_handler(State(state): State<Arc<AppState>>) -> Json<SignalResponse> {
    state.idle.presence();
    signal_response(&state)
}

/// Handle POST /visibility - Tab shown or hidden
pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VisibilityRequest>,
) -> Json<SignalResponse> {
    state.idle.set_visible(request.visible);
    signal_response(&state)
}

/// Handle POST /confirm - Explicit "still working"
pub async fn confirm_handler(State(state): State<Arc<AppState>>) -> Json<SignalResponse> {
    info!("User confirmed they are still working");
    state.idle.confirm();
    signal_response(&state)
}

/// Handle GET /status - Idle phase, escalation state and timer count
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.idle.snapshot();
    Json(StatusResponse {
        user_id: state.config.user_id.clone(),
        session_id: state.config.session_id.clone(),
        phase: snapshot.phase,
        tab_visible: snapshot.tab_visible,
        escalation: state.coordinator.status(),
        timers: state.registry.len(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
