// provider.rs — StatusProvider: the external PR/CI status source.
//
// The monitor only needs a snapshot per poll: is the PR merged, closed,
// or open, and if open, is anything failing or still running. The gh-CLI
// implementation lives here; tests swap in an in-memory fake.

use std::path::PathBuf;
use std::process::Command;

use crate::error::MonitorError;

/// Coarse PR state as reported by the hosting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// One poll's view of a PR and its checks.
#[derive(Debug, Clone)]
pub struct PrSnapshot {
    pub state: PrState,

    /// Name of a failing check, if any (only meaningful while open).
    pub failing_check: Option<String>,

    /// Whether any check is still running.
    pub checks_pending: bool,
}

/// Source of PR/CI status snapshots.
pub trait StatusProvider: Send + Sync {
    fn snapshot(&self, pr: &str) -> Result<PrSnapshot, MonitorError>;
}

/// StatusProvider backed by the gh CLI (assumes `gh auth login` done).
pub struct GhStatusProvider {
    work_dir: PathBuf,
}

impl GhStatusProvider {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn gh(&self, args: &[&str]) -> Result<String, MonitorError> {
        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| MonitorError::Provider(format!("failed to run gh: {}", e)))?;
        if !output.status.success() {
            return Err(MonitorError::Provider(format!(
                "gh {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl StatusProvider for GhStatusProvider {
    fn snapshot(&self, pr: &str) -> Result<PrSnapshot, MonitorError> {
        let raw = self.gh(&["pr", "view", pr, "--json", "state,merged"])?;
        let view: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| MonitorError::Provider(format!("bad gh pr view output: {}", e)))?;

        if view["merged"].as_bool().unwrap_or(false) {
            return Ok(PrSnapshot {
                state: PrState::Merged,
                failing_check: None,
                checks_pending: false,
            });
        }
        if view["state"].as_str() == Some("CLOSED") {
            return Ok(PrSnapshot {
                state: PrState::Closed,
                failing_check: None,
                checks_pending: false,
            });
        }

        // Open PR — inspect the check runs. `gh pr checks` exits non-zero
        // when checks fail, so a command failure here is not fatal; the
        // JSON on stdout is still what we parse when present.
        let raw = self.gh(&["pr", "checks", pr, "--json", "name,state,conclusion"]);
        let checks: serde_json::Value = match raw {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| MonitorError::Provider(format!("bad gh pr checks output: {}", e)))?,
            Err(_) => serde_json::Value::Array(Vec::new()),
        };

        let mut failing_check = None;
        let mut checks_pending = false;
        if let Some(items) = checks.as_array() {
            for check in items {
                let state = check["conclusion"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .or_else(|| check["state"].as_str())
                    .unwrap_or("UNKNOWN");
                match state {
                    "PENDING" | "IN_PROGRESS" | "QUEUED" => checks_pending = true,
                    "SUCCESS" | "SKIPPED" | "NEUTRAL" => {}
                    _ => {
                        if failing_check.is_none() {
                            failing_check =
                                Some(check["name"].as_str().unwrap_or("unknown").to_string());
                        }
                    }
                }
            }
        }

        Ok(PrSnapshot {
            state: PrState::Open,
            failing_check,
            checks_pending,
        })
    }
}
