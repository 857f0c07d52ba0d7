//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "activity-timer")]
#[command(about = "Activity-aware timer coordination server")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// User whose timers are paused when the idle prompt times out
    #[arg(short, long, default_value = "local")]
    pub user_id: String,

    /// Timer-id of the work-session timer
    #[arg(long, default_value = "session")]
    pub session_id: String,

    /// Seconds without presence before the idle prompt appears
    #[arg(long, default_value = "120")]
    pub idle_timeout_secs: u64,

    /// Seconds the idle prompt waits before auto-pausing
    #[arg(long, default_value = "60")]
    pub prompt_timeout_secs: u64,

    /// Minimum spacing between accepted presence signals, in milliseconds
    #[arg(long, default_value = "1000")]
    pub presence_throttle_ms: u64,

    /// Directory for persisted timer state (in-memory when omitted)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// JSON-lines activity log file (tracing only when omitted)
    #[arg(long)]
    pub activity_log: Option<PathBuf>,

    /// Pause the user's timers while the tab is hidden
    #[arg(long)]
    pub pause_on_hidden: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn idle_config(&self) -> IdleConfig {
        IdleConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            prompt_timeout: Duration::from_secs(self.prompt_timeout_secs),
            presence_throttle: Duration::from_millis(self.presence_throttle_ms),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            idle: self.idle_config(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            pause_on_hidden: self.pause_on_hidden,
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Idle detector thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleConfig {
    /// Silence before entering the prompting phase
    pub idle_timeout: Duration,
    /// How long the prompt waits before auto-pausing
    pub prompt_timeout: Duration,
    /// At most one countdown reset per this interval while active
    pub presence_throttle: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            prompt_timeout: Duration::from_secs(60),
            presence_throttle: Duration::from_secs(1),
        }
    }
}

/// Everything the engine needs besides its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub idle: IdleConfig,
    pub user_id: String,
    pub session_id: String,
    pub pause_on_hidden: bool,
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle: IdleConfig::default(),
            user_id: "local".to_string(),
            session_id: "session".to_string(),
            pause_on_hidden: false,
            tick_interval: Duration::from_secs(1),
        }
    }
}
