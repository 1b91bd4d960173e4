// builtin/mod.rs — The builtin capability set.
//
// These are the side-effecting operations the agent ships with: git
// branch management, GitHub PR/CI queries via the gh CLI, and an
// allowlisted read-only shell. All of them run external commands inside
// the sandbox root.

pub mod git;
pub mod github;
pub mod shell;

pub use git::GitBranchPush;
pub use github::{GithubCiStatus, GithubCreatePr, GithubPrStatus};
pub use shell::SafeShell;

use std::path::Path;
use std::process::Command;

use crate::error::ToolError;

/// Run an external command in `work_dir`, returning trimmed stdout.
/// Non-zero exit becomes [`ToolError::ExecutionFailed`] carrying stderr.
pub(crate) fn run_command(
    work_dir: &Path,
    program: &str,
    args: &[&str],
) -> Result<String, ToolError> {
    let output = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::ExecutionFailed(format!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
