//! Idle detector state machine
//!
//! Pure and clock-free: every method takes "now" as milliseconds on a
//! monotonic timeline chosen by the caller. The async driver in
//! `tasks::idle_detector` sleeps until [`IdleMachine::next_deadline`] and
//! calls [`IdleMachine::poll`]; because the deadline is recomputed from the
//! current state after every input, a countdown that no longer applies can
//! never fire.
//!
//! ```text
//! active --silence--> idle-prompting --prompt window--> paused-by-idle
//!    ^                      |                                 |
//!    +------ presence ------+------------ presence -----------+
//! ```

use serde::{Deserialize, Serialize};

use crate::config::IdleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdlePhase {
    Active,
    IdlePrompting,
    PausedByIdle,
}

/// Phase change produced by an input or a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    /// Silence exceeded the idle threshold; the prompt should be shown
    Idle,
    /// The user is back
    Active { from: IdlePhase },
    /// The prompt window ran out with no answer
    PromptTimeout { idle_for_ms: i64 },
}

/// Read-only view published to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleSnapshot {
    pub phase: IdlePhase,
    pub tab_visible: bool,
    pub last_activity_at: i64,
    pub prompt_started_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct IdleMachine {
    idle_timeout_ms: i64,
    prompt_timeout_ms: i64,
    throttle_ms: i64,
    phase: IdlePhase,
    last_activity_at: i64,
    last_signal_at: Option<i64>,
    prompt_started_at: Option<i64>,
    tab_visible: bool,
}

impl IdleMachine {
    pub fn new(config: IdleConfig, now: i64) -> Self {
        Self {
            idle_timeout_ms: config.idle_timeout.as_millis() as i64,
            prompt_timeout_ms: config.prompt_timeout.as_millis() as i64,
            throttle_ms: config.presence_throttle.as_millis() as i64,
            phase: IdlePhase::Active,
            last_activity_at: now,
            last_signal_at: None,
            prompt_started_at: None,
            tab_visible: true,
        }
    }

    pub fn phase(&self) -> IdlePhase {
        self.phase
    }

    pub fn tab_visible(&self) -> bool {
        self.tab_visible
    }

    pub fn snapshot(&self) -> IdleSnapshot {
        IdleSnapshot {
            phase: self.phase,
            tab_visible: self.tab_visible,
            last_activity_at: self.last_activity_at,
            prompt_started_at: self.prompt_started_at,
        }
    }

    /// A pointer, keyboard or touch signal.
    ///
    /// While active, signals closer together than the throttle interval are
    /// dropped. Outside active every signal counts.
    pub fn presence(&mut self, now: i64) -> Option<IdleTransition> {
        if self.phase == IdlePhase::Active {
            if let Some(last) = self.last_signal_at {
                if now - last < self.throttle_ms {
                    return None;
                }
            }
        }
        self.last_signal_at = Some(now);
        self.wake(now)
    }

    /// Explicit "still working" answer. Never throttled.
    pub fn confirm(&mut self, now: i64) -> Option<IdleTransition> {
        self.wake(now)
    }

    fn wake(&mut self, now: i64) -> Option<IdleTransition> {
        let from = self.phase;
        self.phase = IdlePhase::Active;
        self.last_activity_at = now;
        self.prompt_started_at = None;
        match from {
            IdlePhase::Active => None,
            _ => Some(IdleTransition::Active { from }),
        }
    }

    /// Record a tab visibility change. Returns whether visibility changed.
    ///
    /// Hidden suspends all countdowns. Becoming visible restarts the current
    /// phase's countdown from `now`.
    pub fn set_visible(&mut self, visible: bool, now: i64) -> bool {
        if self.tab_visible == visible {
            return false;
        }
        self.tab_visible = visible;
        if visible {
            match self.phase {
                IdlePhase::Active => self.last_activity_at = now,
                IdlePhase::IdlePrompting => self.prompt_started_at = Some(now),
                IdlePhase::PausedByIdle => {}
            }
        }
        true
    }

    /// When the next phase change is due, if any
    pub fn next_deadline(&self) -> Option<i64> {
        if !self.tab_visible {
            return None;
        }
        match self.phase {
            IdlePhase::Active => Some(self.last_activity_at + self.idle_timeout_ms),
            IdlePhase::IdlePrompting => self
                .prompt_started_at
                .map(|started| started + self.prompt_timeout_ms),
            IdlePhase::PausedByIdle => None,
        }
    }

    /// Apply at most one due transition
    pub fn poll(&mut self, now: i64) -> Option<IdleTransition> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        match self.phase {
            IdlePhase::Active => {
                self.phase = IdlePhase::IdlePrompting;
                self.prompt_started_at = Some(now);
                Some(IdleTransition::Idle)
            }
            IdlePhase::IdlePrompting => {
                self.phase = IdlePhase::PausedByIdle;
                self.prompt_started_at = None;
                Some(IdleTransition::PromptTimeout {
                    idle_for_ms: (now - self.last_activity_at).max(0),
                })
            }
            IdlePhase::PausedByIdle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn machine() -> IdleMachine {
        IdleMachine::new(
            IdleConfig {
                idle_timeout: Duration::from_secs(5),
                prompt_timeout: Duration::from_secs(3),
                presence_throttle: Duration::from_secs(1),
            },
            0,
        )
    }

    #[test]
    fn silence_walks_through_every_phase() {
        let mut m = machine();
        assert_eq!(m.poll(4_999), None);
        assert_eq!(m.poll(5_000), Some(IdleTransition::Idle));
        assert_eq!(m.phase(), IdlePhase::IdlePrompting);
        assert_eq!(m.next_deadline(), Some(8_000));
        assert_eq!(m.poll(7_999), None);
        assert_eq!(
            m.poll(8_000),
            Some(IdleTransition::PromptTimeout { idle_for_ms: 8_000 })
        );
        assert_eq!(m.phase(), IdlePhase::PausedByIdle);
        assert_eq!(m.next_deadline(), None);
        assert_eq!(m.poll(60_000), None);
    }

    #[test]
    fn presence_during_prompt_returns_to_active() {
        let mut m = machine();
        m.poll(5_000);
        assert_eq!(
            m.presence(7_000),
            Some(IdleTransition::Active { from: IdlePhase::IdlePrompting })
        );
        assert_eq!(m.snapshot().prompt_started_at, None);
        assert_eq!(m.next_deadline(), Some(12_000));
    }

    #[test]
    fn presence_after_timeout_returns_to_active() {
        let mut m = machine();
        m.poll(5_000);
        m.poll(8_000);
        assert_eq!(
            m.presence(20_000),
            Some(IdleTransition::Active { from: IdlePhase::PausedByIdle })
        );
        assert_eq!(m.phase(), IdlePhase::Active);
    }

    #[test]
    fn presence_is_throttled_only_while_active() {
        let mut m = machine();
        assert_eq!(m.presence(1_000), None);
        assert_eq!(m.next_deadline(), Some(6_000));
        m.presence(1_500);
        assert_eq!(m.next_deadline(), Some(6_000));
        m.presence(2_000);
        assert_eq!(m.next_deadline(), Some(7_000));

        m.poll(7_000);
        assert_eq!(
            m.presence(7_100),
            Some(IdleTransition::Active { from: IdlePhase::IdlePrompting })
        );
    }

    #[test]
    fn confirm_is_never_throttled() {
        let mut m = machine();
        m.presence(4_900);
        m.poll(9_900);
        assert_eq!(
            m.confirm(9_950),
            Some(IdleTransition::Active { from: IdlePhase::IdlePrompting })
        );
        assert_eq!(m.confirm(9_960), None);
    }

    #[test]
    fn hidden_tab_suspends_and_visible_restarts_from_now() {
        let mut m = machine();
        assert!(m.set_visible(false, 1_000));
        assert!(!m.set_visible(false, 1_500));
        assert_eq!(m.next_deadline(), None);
        assert_eq!(m.poll(100_000), None);

        assert!(m.set_visible(true, 100_000));
        assert_eq!(m.next_deadline(), Some(105_000));
    }

    #[test]
    fn hidden_during_prompt_restarts_prompt_window() {
        let mut m = machine();
        m.poll(5_000);
        m.set_visible(false, 6_000);
        assert_eq!(m.poll(50_000), None);
        m.set_visible(true, 50_000);
        assert_eq!(m.phase(), IdlePhase::IdlePrompting);
        assert_eq!(m.next_deadline(), Some(53_000));
    }

    #[test]
    fn phase_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(IdlePhase::PausedByIdle).unwrap(),
            "paused-by-idle"
        );
        assert_eq!(
            serde_json::to_value(IdlePhase::IdlePrompting).unwrap(),
            "idle-prompting"
        );
    }
}
