// capability.rs — The Capability trait: one shape for every tool.
//
// VCS operations, shell execution, code-hosting queries — heterogeneous
// behaviors, all invoked through the same contract: structured JSON
// parameters in, structured JSON result (or typed failure) out. Each
// capability declares its parameter schema (via schemars) so the
// orchestration loop can offer it to the reasoning engine, and declares
// the filesystem paths a call will touch so the dispatcher can enforce
// the sandbox BEFORE execution.

use std::path::PathBuf;

use serde_json::Value;

use crate::error::ToolError;

/// A named, side-effecting operation invocable through the dispatcher.
pub trait Capability: Send + Sync {
    /// Stable tool name (e.g. "git_create_branch_and_push").
    fn name(&self) -> &str;

    /// One-line description offered to the reasoning engine.
    fn description(&self) -> &str;

    /// JSON schema of the parameter object.
    fn params_schema(&self) -> Value;

    /// Filesystem paths this call will touch, given its parameters.
    /// Checked against the sandbox root before execution. Capabilities
    /// with no filesystem footprint return an empty list.
    fn requested_paths(&self, _params: &Value) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Execute the call.
    fn execute(&self, params: Value) -> Result<Value, ToolError>;
}

/// Render the schema of a parameter struct as a JSON value.
pub fn schema_for<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Parse a capability's parameter object, mapping malformed input to
/// [`ToolError::InvalidParams`].
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams(e.to_string()))
}
