// error.rs — Error types for CI/PR monitoring.

use thiserror::Error;

/// Errors that can occur while arming or polling sessions.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The branch already has a session (live or terminal).
    #[error("branch {0} already has a poll session")]
    AlreadyArmed(String),

    /// No session exists for the branch.
    #[error("no poll session for branch {0}")]
    NoSession(String),

    /// The session has reached a terminal state and cannot be cancelled.
    #[error("poll session for branch {0} is already terminal")]
    AlreadyTerminal(String),

    /// The external PR/CI status query failed.
    #[error("status provider error: {0}")]
    Provider(String),

    /// A goal store mutation requested by the monitor failed.
    #[error(transparent)]
    Goal(#[from] mk_goal::GoalError),
}
