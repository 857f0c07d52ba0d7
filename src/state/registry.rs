//! Timer registry
//!
//! Owns every live [`TimerState`], keyed by timer-id. The map only changes
//! through register, pause, resume and unregister; bulk operations are loops
//! over the single-timer versions. Every operation is total.
//!
//! Store writes are issued while the map lock is still held, so the store
//! sees them in the same order as memory. Store failures are logged and
//! swallowed. The engine wraps its store in a
//! [`QueuedStore`](crate::services::QueuedStore), which makes those writes
//! non-blocking.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::timer_state::{format_hms, PersistedTimer, TimerState};
use crate::{services::TimerStore, utils::Clock};

/// Registration request for a timer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSpec {
    pub timer_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    /// Epoch ms the timer started; defaults to registration time
    #[serde(default)]
    pub started_at: Option<i64>,
}

impl TimerSpec {
    pub fn new(timer_id: impl Into<String>) -> Self {
        Self {
            timer_id: timer_id.into(),
            ..Self::default()
        }
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn assignee(mut self, assignee_id: impl Into<String>) -> Self {
        self.assignee_id = Some(assignee_id.into());
        self
    }

    pub fn started_at(mut self, started_at: i64) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// Display-ready view of one timer at a given instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerReading {
    pub timer_id: String,
    pub owner_id: Option<String>,
    pub assignee_id: Option<String>,
    pub is_paused: bool,
    pub elapsed_ms: i64,
    pub display: String,
}

impl TimerReading {
    fn of(state: &TimerState, now: i64) -> Self {
        let elapsed_ms = state.elapsed(now);
        Self {
            timer_id: state.timer_id.clone(),
            owner_id: state.owner_id.clone(),
            assignee_id: state.assignee_id.clone(),
            is_paused: state.is_paused(),
            elapsed_ms,
            display: format_hms(elapsed_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Paused,
    Running,
}

/// Shared registry of all live timers
#[derive(Debug)]
pub struct TimerRegistry {
    timers: Mutex<HashMap<String, TimerState>>,
    store: Arc<dyn TimerStore>,
    clock: Arc<dyn Clock>,
}

impl TimerRegistry {
    pub fn new(store: Arc<dyn TimerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            store,
            clock,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TimerState>> {
        // Every mutation leaves a timer consistent, so a poisoned map is still usable
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, timer_id: &str, blob: PersistedTimer) {
        if let Err(e) = self.store.save(timer_id, &blob) {
            warn!("Failed to persist timer state for {}: {}", timer_id, e);
        }
    }

    /// Register a timer. Already-known ids are left untouched and `false` is
    /// returned.
    ///
    /// With `initial` absent, pause state is hydrated from the store; a
    /// missing or unreadable blob yields a fresh running timer. The store read
    /// happens outside the map lock.
    pub fn register(&self, spec: TimerSpec, initial: Option<PersistedTimer>) -> bool {
        if self.contains(&spec.timer_id) {
            debug!("Timer {} already registered, keeping existing state", spec.timer_id);
            return false;
        }

        let blob = match initial {
            Some(blob) => Some(blob),
            None => match self.store.load(&spec.timer_id) {
                Ok(blob) => blob,
                Err(e) => {
                    warn!("Failed to load timer state for {}: {}", spec.timer_id, e);
                    None
                }
            },
        };

        let now = self.now_ms();
        let mut timers = self.lock();
        if timers.contains_key(&spec.timer_id) {
            debug!("Timer {} registered concurrently, keeping existing state", spec.timer_id);
            return false;
        }

        let started_at = spec.started_at.unwrap_or(now);
        let state = match blob {
            Some(blob) => TimerState::hydrate(
                spec.timer_id.clone(),
                spec.owner_id,
                spec.assignee_id,
                started_at,
                blob,
                now,
            ),
            None => TimerState::new(spec.timer_id.clone(), spec.owner_id, spec.assignee_id, started_at),
        };
        info!(
            "Registered timer {} (paused={}, paused_ms={})",
            spec.timer_id,
            state.is_paused(),
            state.accumulated_paused_ms()
        );
        if initial.is_some() {
            self.persist(&spec.timer_id, state.to_persisted());
        }
        timers.insert(spec.timer_id, state);
        true
    }

    /// Drop a timer and its persisted blob. Returns whether it was known.
    pub fn unregister(&self, timer_id: &str) -> bool {
        let mut timers = self.lock();
        let removed = timers.remove(timer_id).is_some();
        if let Err(e) = self.store.remove(timer_id) {
            warn!("Failed to remove persisted timer state for {}: {}", timer_id, e);
        }
        drop(timers);

        if removed {
            info!("Unregistered timer {}", timer_id);
        }
        removed
    }

    /// Pause one timer. Returns true only if it changed state.
    pub fn pause(&self, timer_id: &str) -> bool {
        self.transition(timer_id, Target::Paused)
    }

    /// Resume one timer. Returns true only if it changed state.
    pub fn resume(&self, timer_id: &str) -> bool {
        self.transition(timer_id, Target::Running)
    }

    fn transition(&self, timer_id: &str, target: Target) -> bool {
        let now = self.now_ms();
        let mut timers = self.lock();
        let Some(state) = timers.get_mut(timer_id) else {
            debug!("Ignoring {:?} for unknown timer {}", target, timer_id);
            return false;
        };

        let changed = match target {
            Target::Paused => state.pause_at(now),
            Target::Running => state.resume_at(now),
        };
        if !changed {
            debug!("Timer {} already {:?}", timer_id, target);
            return false;
        }

        let blob = state.to_persisted();
        self.persist(timer_id, blob);
        drop(timers);
        debug!("Timer {} -> {:?}", timer_id, target);
        true
    }

    fn bulk<F>(&self, target: Target, label: &str, filter: F) -> usize
    where
        F: Fn(&TimerState) -> bool,
    {
        let ids: Vec<String> = self
            .lock()
            .values()
            .filter(|state| filter(*state))
            .filter(|state| match target {
                Target::Paused => !state.is_paused(),
                Target::Running => state.is_paused(),
            })
            .map(|state| state.timer_id.clone())
            .collect();

        let count = ids
            .iter()
            .filter(|id| self.transition(id, target))
            .count();
        info!("{}: {} timer(s) changed", label, count);
        count
    }

    pub fn pause_all(&self) -> usize {
        self.bulk(Target::Paused, "pause_all", |_| true)
    }

    pub fn resume_all(&self) -> usize {
        self.bulk(Target::Running, "resume_all", |_| true)
    }

    /// Pause timers the user owns or is assigned to
    pub fn pause_by_owner(&self, user_id: &str) -> usize {
        self.bulk(Target::Paused, &format!("pause_by_owner({})", user_id), |s| {
            s.belongs_to(user_id)
        })
    }

    /// Resume timers the user owns or is assigned to
    pub fn resume_by_owner(&self, user_id: &str) -> usize {
        self.bulk(Target::Running, &format!("resume_by_owner({})", user_id), |s| {
            s.belongs_to(user_id)
        })
    }

    pub fn get(&self, timer_id: &str) -> Option<TimerState> {
        self.lock().get(timer_id).cloned()
    }

    pub fn contains(&self, timer_id: &str) -> bool {
        self.lock().contains_key(timer_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the timer exists and is counting
    pub fn is_running(&self, timer_id: &str) -> bool {
        self.lock().get(timer_id).is_some_and(|s| !s.is_paused())
    }

    /// Whether any timer matching the user, other than `except`, is counting
    pub fn any_running_for(&self, user_id: &str, except: Option<&str>) -> bool {
        self.lock().values().any(|s| {
            !s.is_paused() && s.belongs_to(user_id) && Some(s.timer_id.as_str()) != except
        })
    }

    pub fn elapsed(&self, timer_id: &str) -> Option<i64> {
        let now = self.now_ms();
        self.lock().get(timer_id).map(|s| s.elapsed(now))
    }

    pub fn reading(&self, timer_id: &str) -> Option<TimerReading> {
        let now = self.now_ms();
        self.lock().get(timer_id).map(|s| TimerReading::of(s, now))
    }

    /// Readings for every timer at one shared instant, sorted by id
    pub fn readings(&self) -> Vec<TimerReading> {
        let now = self.now_ms();
        let mut readings: Vec<TimerReading> = self
            .lock()
            .values()
            .map(|s| TimerReading::of(s, now))
            .collect();
        readings.sort_by(|a, b| a.timer_id.cmp(&b.timer_id));
        readings
    }
}
