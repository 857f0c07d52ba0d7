//! Escalation coordinator
//!
//! Turns idle detector transitions into timer registry calls and activity
//! log entries. Snapshots of what was running are taken before any timer is
//! touched so the log describes the state the user left behind.
//!
//! The work-session timer is paused and resumed by id for the current user
//! regardless of its owner fields; task timers go through the owner-or-
//! assignee filter.

use std::sync::{Arc, Mutex, MutexGuard};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use super::idle_detector::IdleEvent;
use crate::{
    services::{ActivityEvent, ActivityKind, ActivitySink},
    state::{IdlePhase, TimerRegistry},
};

/// Why the coordinator currently holds the user's timers paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseCause {
    Idle,
    TabHidden,
}

/// What a host needs to render the idle prompt and the resume banner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationStatus {
    pub prompt_visible: bool,
    pub resume_prompt_visible: bool,
    pub outstanding_pause: Option<PauseCause>,
    pub last_event: Option<ActivityKind>,
}

/// Running condition captured before a bulk pause or resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningSnapshot {
    pub was_session_running: bool,
    pub was_any_task_running: bool,
}

impl RunningSnapshot {
    pub fn anything_running(&self) -> bool {
        self.was_session_running || self.was_any_task_running
    }
}

#[derive(Debug)]
pub struct EscalationCoordinator {
    registry: Arc<TimerRegistry>,
    sink: Arc<dyn ActivitySink>,
    user_id: String,
    session_id: String,
    pause_on_hidden: bool,
    status: Mutex<EscalationStatus>,
}

impl EscalationCoordinator {
    pub fn new(
        registry: Arc<TimerRegistry>,
        sink: Arc<dyn ActivitySink>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        pause_on_hidden: bool,
    ) -> Self {
        Self {
            registry,
            sink,
            user_id: user_id.into(),
            session_id: session_id.into(),
            pause_on_hidden,
            status: Mutex::new(EscalationStatus::default()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn lock_status(&self) -> MutexGuard<'_, EscalationStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> EscalationStatus {
        self.lock_status().clone()
    }

    pub fn running_snapshot(&self) -> RunningSnapshot {
        RunningSnapshot {
            was_session_running: self.registry.is_running(&self.session_id),
            was_any_task_running: self
                .registry
                .any_running_for(&self.user_id, Some(&self.session_id)),
        }
    }

    fn pause_user_timers(&self) -> usize {
        let session = usize::from(self.registry.pause(&self.session_id));
        session + self.registry.pause_by_owner(&self.user_id)
    }

    fn resume_user_timers(&self) -> usize {
        let session = usize::from(self.registry.resume(&self.session_id));
        session + self.registry.resume_by_owner(&self.user_id)
    }

    fn record(
        &self,
        kind: ActivityKind,
        snapshot: RunningSnapshot,
        tab_visible: bool,
        idle_duration_seconds: Option<u64>,
        notes: Option<&str>,
    ) {
        let event = ActivityEvent {
            event_type: kind,
            user_id: self.user_id.clone(),
            timestamp: Utc::now(),
            was_session_running: snapshot.was_session_running,
            was_any_task_running: snapshot.was_any_task_running,
            tab_visible,
            idle_duration_seconds,
            notes: notes.map(str::to_string),
        };
        if let Err(e) = self.sink.record(&event) {
            warn!("Failed to record {} activity: {}", kind.as_str(), e);
        }
        self.lock_status().last_event = Some(kind);
    }

    /// Idle threshold crossed: show the warning prompt
    pub fn on_idle(&self) {
        debug!("Showing idle prompt for {}", self.user_id);
        self.lock_status().prompt_visible = true;
    }

    /// Prompt window ran out: pause everything the user had running
    pub fn on_prompt_timeout(&self, tab_visible: bool, idle_duration_seconds: u64) -> RunningSnapshot {
        let snapshot = self.running_snapshot();
        let paused = self.pause_user_timers();
        info!(
            "Auto-paused {} timer(s) for {} after {}s idle",
            paused, self.user_id, idle_duration_seconds
        );
        self.record(
            ActivityKind::AutoPaused,
            snapshot,
            tab_visible,
            Some(idle_duration_seconds),
            None,
        );

        let mut status = self.lock_status();
        status.prompt_visible = false;
        if snapshot.anything_running() {
            status.resume_prompt_visible = true;
            status.outstanding_pause = Some(PauseCause::Idle);
        }
        snapshot
    }

    /// The user is back, by presence signal or explicit confirmation.
    ///
    /// Nothing is resumed unless an idle auto-pause is outstanding, so a
    /// confirmation during `idle-prompting` leaves hand-paused timers alone.
    /// After an auto-pause every timer the user owns or is assigned to
    /// resumes, including ones they had paused by hand before going idle.
    pub fn on_active(&self, from: IdlePhase, tab_visible: bool) {
        let held_by_idle = {
            let mut status = self.lock_status();
            status.prompt_visible = false;
            if status.outstanding_pause == Some(PauseCause::Idle) {
                status.outstanding_pause = None;
                status.resume_prompt_visible = false;
                true
            } else {
                false
            }
        };
        if !held_by_idle && from == IdlePhase::Active {
            return;
        }

        let snapshot = self.running_snapshot();
        if held_by_idle {
            let resumed = self.resume_user_timers();
            info!("Resumed {} timer(s) for {}", resumed, self.user_id);
        }
        self.record(ActivityKind::UserContinued, snapshot, tab_visible, None, None);
    }

    /// Tab visibility changed. Only acts when hidden-tab pausing is enabled.
    pub fn on_visibility(&self, visible: bool) {
        if !self.pause_on_hidden {
            return;
        }

        if !visible {
            if self.lock_status().outstanding_pause.is_some() {
                debug!("Timers already held paused, ignoring hidden tab");
                return;
            }
            let snapshot = self.running_snapshot();
            let paused = self.pause_user_timers();
            info!("Tab hidden, paused {} timer(s) for {}", paused, self.user_id);
            self.record(ActivityKind::AutoPaused, snapshot, false, None, Some("tab hidden"));
            if snapshot.anything_running() {
                self.lock_status().outstanding_pause = Some(PauseCause::TabHidden);
            }
            return;
        }

        let held_by_hidden = {
            let mut status = self.lock_status();
            if status.outstanding_pause == Some(PauseCause::TabHidden) {
                status.outstanding_pause = None;
                true
            } else {
                false
            }
        };
        if held_by_hidden {
            let snapshot = self.running_snapshot();
            let resumed = self.resume_user_timers();
            info!("Tab visible, resumed {} timer(s) for {}", resumed, self.user_id);
            self.record(ActivityKind::UserContinued, snapshot, true, None, Some("tab visible"));
        }
    }

    pub fn handle(&self, event: IdleEvent) {
        match event {
            IdleEvent::Idle { .. } => self.on_idle(),
            IdleEvent::PromptTimeout { idle_for, tab_visible } => {
                self.on_prompt_timeout(tab_visible, idle_for.as_secs());
            }
            IdleEvent::Active { from, tab_visible } => self.on_active(from, tab_visible),
            IdleEvent::VisibilityChanged { visible } => self.on_visibility(visible),
        }
    }
}

/// Background task applying idle events to the coordinator
pub async fn escalation_task(
    coordinator: Arc<EscalationCoordinator>,
    mut events: broadcast::Receiver<IdleEvent>,
) {
    info!("Starting escalation task for {}", coordinator.user_id());

    loop {
        match events.recv().await {
            Ok(event) => {
                debug!("Escalation received {:?}", event);
                coordinator.handle(event);
            }
            Err(RecvError::Lagged(skipped)) => {
                error!("Escalation task lagged, {} idle event(s) dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    info!("Escalation task stopped");
}
