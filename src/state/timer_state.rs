//! Timer state structure and the elapsed-time accountant
//!
//! `elapsed` is pure: it only reads the state and the supplied instant.
//! Every mutation of paused time goes through [`TimerState::pause_at`] and
//! [`TimerState::resume_at`], which is where the accounting invariants live:
//!
//! - `accumulated_paused_ms` never decreases and only grows when a pause ends
//! - `current_pause_started_at` is `Some` exactly when the timer is paused
//! - `started_at` is fixed for the life of the timer

use serde::{Deserialize, Serialize};

/// One independently tracked timer (the work session or a task)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub timer_id: String,
    pub owner_id: Option<String>,
    pub assignee_id: Option<String>,
    /// Epoch ms at which the timer began counting
    started_at: i64,
    is_paused: bool,
    /// Paused time already closed out, excluding any pause in progress
    accumulated_paused_ms: i64,
    current_pause_started_at: Option<i64>,
}

/// Persisted shape of a timer's pause bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTimer {
    pub is_paused: bool,
    pub accumulated_paused_duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_pause_started_at: Option<i64>,
}

impl TimerState {
    /// Create a running timer with no pause history
    pub fn new(
        timer_id: impl Into<String>,
        owner_id: Option<String>,
        assignee_id: Option<String>,
        started_at: i64,
    ) -> Self {
        Self {
            timer_id: timer_id.into(),
            owner_id,
            assignee_id,
            started_at,
            is_paused: false,
            accumulated_paused_ms: 0,
            current_pause_started_at: None,
        }
    }

    /// Rebuild a timer from a persisted blob, repairing anything that would
    /// break the pause invariants. `now` stands in for a missing pause start.
    pub fn hydrate(
        timer_id: impl Into<String>,
        owner_id: Option<String>,
        assignee_id: Option<String>,
        started_at: i64,
        blob: PersistedTimer,
        now: i64,
    ) -> Self {
        let mut state = Self::new(timer_id, owner_id, assignee_id, started_at);
        state.accumulated_paused_ms = blob.accumulated_paused_duration.max(0);
        if blob.is_paused {
            state.is_paused = true;
            state.current_pause_started_at = Some(blob.current_pause_started_at.unwrap_or(now));
        }
        state
    }

    pub fn to_persisted(&self) -> PersistedTimer {
        PersistedTimer {
            is_paused: self.is_paused,
            accumulated_paused_duration: self.accumulated_paused_ms,
            current_pause_started_at: self.current_pause_started_at,
        }
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn accumulated_paused_ms(&self) -> i64 {
        self.accumulated_paused_ms
    }

    pub fn current_pause_started_at(&self) -> Option<i64> {
        self.current_pause_started_at
    }

    /// Owner-or-assignee filter used by the by-user bulk operations
    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id) || self.assignee_id.as_deref() == Some(user_id)
    }

    /// Start a pause at `now`. Returns false if the timer was already paused.
    pub fn pause_at(&mut self, now: i64) -> bool {
        if self.is_paused {
            return false;
        }
        self.is_paused = true;
        self.current_pause_started_at = Some(now);
        true
    }

    /// Close the current pause at `now`. Returns false if the timer was running.
    ///
    /// A resume that appears to happen before the pause began (clock skew)
    /// closes a zero-length pause.
    pub fn resume_at(&mut self, now: i64) -> bool {
        if !self.is_paused {
            return false;
        }
        let pause_started = self.current_pause_started_at.unwrap_or(now);
        self.accumulated_paused_ms = self
            .accumulated_paused_ms
            .saturating_add(now.saturating_sub(pause_started).max(0));
        self.current_pause_started_at = None;
        self.is_paused = false;
        true
    }

    /// Accounted time at `now`, never negative
    pub fn elapsed(&self, now: i64) -> i64 {
        elapsed(self, now)
    }
}

/// Elapsed-time accountant: wall time since start minus all paused time,
/// clamped at zero.
pub fn elapsed(state: &TimerState, now: i64) -> i64 {
    let open_pause = match (state.is_paused, state.current_pause_started_at) {
        (true, Some(pause_started)) => now.saturating_sub(pause_started).max(0),
        _ => 0,
    };
    let raw = now
        .saturating_sub(state.started_at)
        .saturating_sub(state.accumulated_paused_ms)
        .saturating_sub(open_pause);
    raw.max(0)
}

/// Render a duration in ms as `HH:MM:SS`. Hours do not wrap at 24.
pub fn format_hms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn timer() -> TimerState {
        TimerState::new("task-1", Some("alice".into()), None, T0)
    }

    #[test]
    fn unpaused_timer_formats_hours_minutes_seconds() {
        let state = timer();
        assert_eq!(format_hms(state.elapsed(T0 + 3_661_000)), "01:01:01");
    }

    #[test]
    fn pause_interval_is_excluded() {
        let mut state = timer();
        assert!(state.pause_at(T0 + 10_000));
        assert!(state.resume_at(T0 + 40_000));
        assert_eq!(state.accumulated_paused_ms(), 30_000);
        assert_eq!(state.elapsed(T0 + 50_000), 20_000);
    }

    #[test]
    fn time_freezes_across_a_pause() {
        let mut state = timer();
        let before = state.elapsed(T0 + 5_000);
        state.pause_at(T0 + 5_000);
        assert_eq!(state.elapsed(T0 + 9_000), before);
        state.resume_at(T0 + 12_000);
        assert_eq!(state.elapsed(T0 + 12_000), before);
        assert_eq!(state.elapsed(T0 + 13_000), before + 1_000);
    }

    #[test]
    fn double_pause_and_double_resume_are_no_ops() {
        let mut state = timer();
        assert!(state.pause_at(T0 + 1_000));
        assert!(!state.pause_at(T0 + 2_000));
        assert_eq!(state.current_pause_started_at(), Some(T0 + 1_000));
        assert!(state.resume_at(T0 + 4_000));
        assert!(!state.resume_at(T0 + 9_000));
        assert_eq!(state.accumulated_paused_ms(), 3_000);
    }

    #[test]
    fn never_negative_under_clock_skew() {
        let mut state = timer();
        assert_eq!(state.elapsed(T0 - 60_000), 0);
        state.pause_at(T0 + 10_000);
        assert_eq!(state.elapsed(T0 + 5_000), 5_000);
        state.resume_at(T0 + 2_000);
        assert_eq!(state.accumulated_paused_ms(), 0);
        assert_eq!(state.elapsed(i64::MIN), 0);
    }

    #[test]
    fn elapsed_is_monotonic_while_running() {
        let state = timer();
        let mut last = 0;
        for step in 0..100 {
            let now = T0 + step * 137;
            let value = state.elapsed(now);
            assert!(value >= last);
            last = value;
        }
    }

    #[test]
    fn persisted_blob_round_trips_elapsed() {
        let mut state = timer();
        state.pause_at(T0 + 1_000);
        state.resume_at(T0 + 3_000);
        state.pause_at(T0 + 7_000);

        let json = serde_json::to_string(&state.to_persisted()).unwrap();
        let blob: PersistedTimer = serde_json::from_str(&json).unwrap();
        let restored = TimerState::hydrate("task-1", None, None, T0, blob, T0 + 99_000);

        for now in [T0, T0 + 8_000, T0 + 60_000] {
            assert_eq!(restored.elapsed(now), state.elapsed(now));
        }
    }

    #[test]
    fn blob_uses_camel_case_and_omits_missing_pause_start() {
        let json = serde_json::to_value(timer().to_persisted()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isPaused": false, "accumulatedPausedDuration": 0})
        );
    }

    #[test]
    fn hydrate_repairs_inconsistent_blobs() {
        let paused_without_start = PersistedTimer {
            is_paused: true,
            accumulated_paused_duration: -5,
            current_pause_started_at: None,
        };
        let state = TimerState::hydrate("t", None, None, T0, paused_without_start, T0 + 500);
        assert_eq!(state.accumulated_paused_ms(), 0);
        assert_eq!(state.current_pause_started_at(), Some(T0 + 500));

        let running_with_stray_start = PersistedTimer {
            is_paused: false,
            accumulated_paused_duration: 10,
            current_pause_started_at: Some(T0),
        };
        let state = TimerState::hydrate("t", None, None, T0, running_with_stray_start, T0);
        assert!(!state.is_paused());
        assert_eq!(state.current_pause_started_at(), None);
    }

    #[test]
    fn belongs_to_matches_owner_or_assignee() {
        let state = TimerState::new("t", Some("a".into()), Some("b".into()), T0);
        assert!(state.belongs_to("a"));
        assert!(state.belongs_to("b"));
        assert!(!state.belongs_to("c"));
        assert!(!TimerState::new("t", None, None, T0).belongs_to(""));
    }

    #[test]
    fn format_hms_does_not_wrap_days() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(-1), "00:00:00");
        assert_eq!(format_hms(100 * 3_600_000 + 59_999), "100:00:59");
    }
}
