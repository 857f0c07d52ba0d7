//! Collaborator boundaries
//!
//! The persistence adapter and the activity log sink. Both are swappable
//! trait objects so hosts and tests can inject their own. The engine always
//! puts a [`QueuedStore`] in front of the host's store.

pub mod activity_log;
pub mod store;
pub mod write_queue;

// Re-export main types
pub use activity_log::{
    ActivityEvent, ActivityKind, ActivitySink, JsonLinesSink, MemorySink, TracingSink,
};
pub use store::{JsonFileStore, MemoryStore, TimerStore};
pub use write_queue::QueuedStore;
