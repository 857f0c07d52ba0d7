//! State management module
//!
//! Timer state and its accountant, the timer registry, the idle state
//! machine, and the shared application state that wires them together.

pub mod app_state;
pub mod idle_state;
pub mod registry;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use idle_state::{IdleMachine, IdlePhase, IdleSnapshot, IdleTransition};
pub use registry::{TimerReading, TimerRegistry, TimerSpec};
pub use timer_state::{elapsed, format_hms, PersistedTimer, TimerState};
