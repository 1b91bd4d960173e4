// error.rs — Error types for the orchestration loop.

use thiserror::Error;

/// Errors that can occur while configuring or driving the loop.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value was malformed (bad env override, etc.).
    #[error("invalid config value for {key}: {value}")]
    ConfigValue { key: String, value: String },

    /// No non-blocked goal exists to focus on.
    #[error("no actionable goal in the backlog")]
    NoActionableGoal,

    /// The reasoning engine call failed.
    #[error("reasoning engine error: {0}")]
    Engine(String),

    /// The reasoning engine did not answer within the turn timeout.
    #[error("reasoning engine timed out after {secs}s")]
    EngineTimeout { secs: u64 },

    #[error(transparent)]
    Goal(#[from] mk_goal::GoalError),

    #[error(transparent)]
    Tool(#[from] mk_tools::ToolError),

    #[error(transparent)]
    Monitor(#[from] mk_monitor::MonitorError),

    #[error(transparent)]
    Reliability(#[from] mk_reliability::ReliabilityError),
}
