//! Background tasks module
//!
//! This module contains the tasks that run alongside the HTTP server: the
//! idle detector, the escalation coordinator and the display ticker.

pub mod escalation;
pub mod idle_detector;
pub mod ticker;

// Re-export main items
pub use escalation::{escalation_task, EscalationCoordinator, EscalationStatus, PauseCause};
pub use idle_detector::{spawn_idle_detector, IdleCommand, IdleEvent, IdleHandle};
pub use ticker::{ticker_task, TickSnapshot};
