//! Activity log sink
//!
//! Records what the idle escalation did. Writes are fire-and-forget: a sink
//! failure is logged by the caller and never undoes the pause or resume it
//! describes.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::Mutex,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SinkError;

/// Kind of activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    AutoPaused,
    UserContinued,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::AutoPaused => "auto_paused",
            ActivityKind::UserContinued => "user_continued",
        }
    }
}

/// One activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub event_type: ActivityKind,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub was_session_running: bool,
    pub was_any_task_running: bool,
    pub tab_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub trait ActivitySink: Send + Sync + std::fmt::Debug {
    fn record(&self, event: &ActivityEvent) -> Result<(), SinkError>;
}

/// Emits events as structured tracing records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, event: &ActivityEvent) -> Result<(), SinkError> {
        info!(
            event_type = event.event_type.as_str(),
            user_id = %event.user_id,
            was_session_running = event.was_session_running,
            was_any_task_running = event.was_any_task_running,
            tab_visible = event.tab_visible,
            idle_duration_seconds = ?event.idle_duration_seconds,
            notes = ?event.notes,
            "activity"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file, then mirrors to tracing
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl ActivitySink for JsonLinesSink {
    fn record(&self, event: &ActivityEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&line))
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;

        TracingSink.record(event)
    }
}

/// Keeps events in memory; used by tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ActivityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ActivitySink for MemorySink {
    fn record(&self, event: &ActivityEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(kind: ActivityKind) -> ActivityEvent {
        ActivityEvent {
            event_type: kind,
            user_id: "alice".into(),
            timestamp: Utc::now(),
            was_session_running: true,
            was_any_task_running: false,
            tab_visible: true,
            idle_duration_seconds: Some(180),
            notes: None,
        }
    }

    #[test]
    fn event_serializes_with_wire_names() {
        let value = serde_json::to_value(event(ActivityKind::AutoPaused)).unwrap();
        assert_eq!(value["eventType"], "auto_paused");
        assert_eq!(value["wasSessionRunning"], true);
        assert_eq!(value["idleDurationSeconds"], 180);
        assert!(value.get("notes").is_none());
    }

    #[test]
    fn json_lines_sink_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let sink = JsonLinesSink::new(&path);
        sink.record(&event(ActivityKind::AutoPaused)).unwrap();
        sink.record(&event(ActivityKind::UserContinued)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<ActivityKind> = contents
            .lines()
            .map(|l| serde_json::from_str::<ActivityEvent>(l).unwrap().event_type)
            .collect();
        assert_eq!(kinds, vec![ActivityKind::AutoPaused, ActivityKind::UserContinued]);
    }

    #[test]
    fn json_lines_sink_reports_unwritable_path() {
        let dir = tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("log.jsonl"));
        assert!(matches!(
            sink.record(&event(ActivityKind::AutoPaused)),
            Err(SinkError::Io { .. })
        ));
    }
}
