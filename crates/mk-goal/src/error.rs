// error.rs — Error types for the goal backlog subsystem.

use thiserror::Error;

/// Errors that can occur during backlog operations.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize backlog data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Bad input to a backlog mutation (e.g. empty description).
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(u64),

    /// Invalid status transition.
    #[error("invalid transition from {from} to {to} for goal {goal_id}")]
    InvalidTransition {
        goal_id: u64,
        from: String,
        to: String,
    },

    /// All subtasks are already done — the caller should request completion.
    #[error("no subtasks remaining for goal {0}")]
    NoSubtasksRemaining(u64),
}
