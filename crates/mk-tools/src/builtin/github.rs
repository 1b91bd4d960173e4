// github.rs — GitHub PR and CI queries through the gh CLI.
//
// Assumes `gh auth login` has already been done in the environment.
// PR creation honors the automerge flag from configuration; the flag is
// read here and never written anywhere in the codebase.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{parse_params, schema_for, Capability};
use crate::error::ToolError;

use super::run_command;

fn default_base() -> String {
    "main".to_string()
}

fn default_draft() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePrParams {
    /// PR title.
    pub title: String,
    /// PR body (markdown).
    pub body: String,
    /// Target branch.
    #[serde(default = "default_base")]
    pub base: String,
    /// Open as a draft PR.
    #[serde(default = "default_draft")]
    pub draft: bool,
}

/// Create a GitHub pull request for the current branch.
pub struct GithubCreatePr {
    work_dir: PathBuf,
    automerge_enabled: bool,
}

impl GithubCreatePr {
    pub fn new(work_dir: impl Into<PathBuf>, automerge_enabled: bool) -> Self {
        Self {
            work_dir: work_dir.into(),
            automerge_enabled,
        }
    }
}

impl Capability for GithubCreatePr {
    fn name(&self) -> &str {
        "github_create_pr"
    }

    fn description(&self) -> &str {
        "Create a GitHub pull request. Draft by default; automerge only when the flag is enabled."
    }

    fn params_schema(&self) -> Value {
        schema_for::<CreatePrParams>()
    }

    fn requested_paths(&self, _params: &Value) -> Vec<PathBuf> {
        vec![self.work_dir.clone()]
    }

    fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: CreatePrParams = parse_params(params)?;
        if params.title.trim().is_empty() || params.body.trim().is_empty() {
            return Err(ToolError::InvalidParams(
                "title and body must not be empty".to_string(),
            ));
        }

        let branch = run_command(
            &self.work_dir,
            "git",
            &["rev-parse", "--abbrev-ref", "HEAD"],
        )?;

        let mut args: Vec<&str> = vec![
            "pr",
            "create",
            "--title",
            &params.title,
            "--body",
            &params.body,
            "--base",
            &params.base,
        ];
        if params.draft {
            args.push("--draft");
        }
        if self.automerge_enabled {
            args.extend(["--auto", "--squash"]);
        }

        let pr_url = run_command(&self.work_dir, "gh", &args)?;
        let pr_number = pr_url.rsplit('/').next().unwrap_or("").to_string();

        tracing::info!(%pr_url, branch, "created pull request");
        Ok(json!({
            "pr_url": pr_url,
            "pr_number": pr_number,
            "branch": branch,
            "draft": params.draft,
        }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PrQueryParams {
    /// PR number or URL.
    pub pr: String,
}

/// Fetch the current state of a pull request.
pub struct GithubPrStatus {
    work_dir: PathBuf,
}

impl GithubPrStatus {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl Capability for GithubPrStatus {
    fn name(&self) -> &str {
        "github_pr_status"
    }

    fn description(&self) -> &str {
        "Get the current status of a PR (open, merged, mergeable, base/head branches)."
    }

    fn params_schema(&self) -> Value {
        schema_for::<PrQueryParams>()
    }

    fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: PrQueryParams = parse_params(params)?;
        let raw = run_command(
            &self.work_dir,
            "gh",
            &[
                "pr",
                "view",
                &params.pr,
                "--json",
                "state,title,number,merged,mergeable,baseRefName,headRefName",
            ],
        )?;
        serde_json::from_str(&raw)
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to parse gh output: {}", e)))
    }
}

/// Fetch CI check results for a pull request.
pub struct GithubCiStatus {
    work_dir: PathBuf,
}

impl GithubCiStatus {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl Capability for GithubCiStatus {
    fn name(&self) -> &str {
        "github_ci_status"
    }

    fn description(&self) -> &str {
        "Check CI status of a PR: per-check results plus an overall pass/pending/fail summary."
    }

    fn params_schema(&self) -> Value {
        schema_for::<PrQueryParams>()
    }

    fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: PrQueryParams = parse_params(params)?;
        let raw = run_command(
            &self.work_dir,
            "gh",
            &["pr", "checks", &params.pr, "--json", "name,state,conclusion"],
        )?;
        let checks: Value = serde_json::from_str(&raw)
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to parse gh output: {}", e)))?;

        let mut all_passed = true;
        let mut pending = false;
        if let Some(items) = checks.as_array() {
            for check in items {
                let state = check["conclusion"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .or_else(|| check["state"].as_str())
                    .unwrap_or("UNKNOWN");
                match state {
                    "PENDING" | "IN_PROGRESS" | "QUEUED" => pending = true,
                    "SUCCESS" | "SKIPPED" | "NEUTRAL" => {}
                    _ => all_passed = false,
                }
            }
        }

        Ok(json!({
            "checks": checks,
            "all_passed": all_passed && !pending,
            "pending": pending,
        }))
    }
}
