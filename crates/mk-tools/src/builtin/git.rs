// git.rs — Branch creation and push.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{parse_params, schema_for, Capability};
use crate::error::ToolError;

use super::run_command;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BranchPushParams {
    /// Branch name (use semantic names like "feat/add-login").
    pub branch_name: String,
}

/// Create a new git branch and push it to origin with upstream tracking.
pub struct GitBranchPush {
    work_dir: PathBuf,
}

impl GitBranchPush {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl Capability for GitBranchPush {
    fn name(&self) -> &str {
        "git_create_branch_and_push"
    }

    fn description(&self) -> &str {
        "Create a new git branch and push it to origin. Use semantic names like feat/add-login."
    }

    fn params_schema(&self) -> Value {
        schema_for::<BranchPushParams>()
    }

    fn requested_paths(&self, _params: &Value) -> Vec<PathBuf> {
        vec![self.work_dir.clone()]
    }

    fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: BranchPushParams = parse_params(params)?;
        if params.branch_name.trim().is_empty() {
            return Err(ToolError::InvalidParams(
                "branch_name must not be empty".to_string(),
            ));
        }

        run_command(&self.work_dir, "git", &["checkout", "-b", &params.branch_name])?;
        let pushed = run_command(
            &self.work_dir,
            "git",
            &["push", "--set-upstream", "origin", &params.branch_name],
        )?;

        Ok(json!({
            "branch": params.branch_name,
            "pushed": true,
            "output": pushed,
        }))
    }
}
