// error.rs — Error types for tool dispatch.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while registering or dispatching capabilities.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A capability with this name is already registered.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// No capability registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The call requested a filesystem scope outside the sandbox root.
    /// Fatal to the call; the scope is never silently widened.
    #[error("sandbox violation: tool {tool} requested {path}")]
    SandboxViolation { tool: String, path: PathBuf },

    /// Parameters did not match the capability's declared schema.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The capability ran but reported failure (non-zero exit, API error).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The capability exceeded the per-call timeout.
    #[error("tool {tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// A file I/O operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
