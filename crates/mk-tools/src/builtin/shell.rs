// shell.rs — Allowlisted read-only shell execution.
//
// The agent gets inspection commands only: listing, searching, reading,
// and read-only git queries. Anything that writes, deletes, or installs
// is rejected up front. The per-call timeout comes from the dispatcher.

use std::path::PathBuf;
use std::process::Command;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{parse_params, schema_for, Capability};
use crate::error::ToolError;

/// Command prefixes the shell tool will run.
const ALLOWED_PREFIXES: &[&str] = &[
    "ls", "tree", "find", "grep", "rg", "cat", "head", "tail", "wc",
    "git status", "git diff", "git log", "git branch", "git remote",
];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShellParams {
    /// The shell command to run (e.g. "ls -la src/", "grep -r TODO .").
    pub cmd: String,
}

/// Run a safe, read-only shell command inside the sandbox root.
pub struct SafeShell {
    work_dir: PathBuf,
}

impl SafeShell {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn allowed(cmd: &str) -> bool {
        ALLOWED_PREFIXES.iter().any(|p| cmd.starts_with(p))
    }
}

impl Capability for SafeShell {
    fn name(&self) -> &str {
        "safe_shell"
    }

    fn description(&self) -> &str {
        "Run a read-only shell command to inspect files or repo state. \
         Allowed: ls, tree, find, grep, rg, cat, head, tail, wc, \
         git status/diff/log/branch/remote."
    }

    fn params_schema(&self) -> Value {
        schema_for::<ShellParams>()
    }

    fn requested_paths(&self, _params: &Value) -> Vec<PathBuf> {
        vec![self.work_dir.clone()]
    }

    fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: ShellParams = parse_params(params)?;
        let cmd = params.cmd.trim();
        if cmd.is_empty() {
            return Err(ToolError::InvalidParams("empty command".to_string()));
        }
        if !Self::allowed(cmd) {
            return Err(ToolError::ExecutionFailed(format!(
                "command not allowed: {} (allowed prefixes: {})",
                cmd,
                ALLOWED_PREFIXES.join(", ")
            )));
        }

        // Whitespace splitting, no shell interpolation — the allowlist is
        // prefix-based so quoting tricks cannot smuggle another program in.
        let mut parts = cmd.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ToolError::InvalidParams("empty command".to_string()))?;
        let output = Command::new(program)
            .args(parts)
            .current_dir(&self.work_dir)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(ToolError::ExecutionFailed(format!(
                "command failed (rc={}): {}",
                code,
                if stderr.is_empty() { &stdout } else { &stderr }
            )));
        }

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "returncode": code,
        }))
    }
}
