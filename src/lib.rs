//! Activity Timer - activity-aware timer coordination
//!
//! Tracks a work-session timer and one timer per in-progress task, keeps
//! their accounted time exact across pauses and reloads, and pauses them when
//! the user goes idle and ignores the warning prompt.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, EngineConfig, IdleConfig};
pub use error::{SinkError, StoreError};
pub use state::{AppState, TimerRegistry, TimerSpec, TimerState};
pub use utils::shutdown_signal;
