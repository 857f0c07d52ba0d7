//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    state::{IdlePhase, PersistedTimer, TimerReading, TimerSpec},
    tasks::EscalationStatus,
};

/// Body of `POST /timers`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub spec: TimerSpec,
    #[serde(default)]
    pub initial: Option<PersistedTimer>,
}

/// Body of `POST /visibility`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// Response for single-timer commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub changed: bool,
    pub timer: Option<TimerReading>,
}

impl TimerResponse {
    pub fn new(message: String, changed: bool, timer: Option<TimerReading>) -> Self {
        let status = match &timer {
            Some(t) if t.is_paused => "paused",
            Some(_) => "running",
            None => "removed",
        };
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            changed,
            timer,
        }
    }
}

/// Response for bulk pause/resume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub changed: usize,
}

impl BulkResponse {
    pub fn new(message: String, changed: usize) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            changed,
        }
    }
}

/// Acknowledgement for presence, visibility and confirmation signals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResponse {
    pub accepted: bool,
    pub phase: IdlePhase,
    pub tab_visible: bool,
}

/// Engine status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub user_id: String,
    pub session_id: String,
    pub phase: IdlePhase,
    pub tab_visible: bool,
    pub escalation: EscalationStatus,
    pub timers: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
