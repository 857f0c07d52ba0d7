//! HTTP API module
//!
//! The surface a browser front end talks to: timer commands, presence and
//! visibility signals, and readings.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", post(register_handler).get(list_handler))
        .route("/timers/:timer_id", get(get_handler).delete(unregister_handler))
        .route("/timers/:timer_id/pause", post(pause_handler))
        .route("/timers/:timer_id/resume", post(resume_handler))
        .route("/bulk/pause", post(pause_all_handler))
        .route("/bulk/resume", post(resume_all_handler))
        .route("/users/:user_id/pause", post(pause_user_handler))
        .route("/users/:user_id/resume", post(resume_user_handler))
        .route("/presence", post(presence_handler))
        .route("/visibility", post(visibility_handler))
        .route("/confirm", post(confirm_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
