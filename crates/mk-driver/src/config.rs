// config.rs — AgentConfig: recognized options from mako.toml + env.
//
// Precedence: built-in defaults, then mako.toml, then environment
// variables. The persisted stores and the timing log all live under the
// sandbox root, so one path setting anchors everything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Top-level agent configuration from mako.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Pass `--auto --squash` when opening PRs. Never flips itself.
    #[serde(default)]
    pub automerge_enabled: bool,

    /// Seconds between CI poll sweeps.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Poll attempts per session before it times out.
    #[serde(default = "default_poll_timeout_attempts")]
    pub poll_timeout_attempts: u32,

    /// Seconds the loop waits on one reasoning-engine call.
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Tools scoring below this are flagged to the engine.
    #[serde(default = "default_low_threshold")]
    pub reliability_low_threshold: f64,

    /// The monorepo root all capability calls are confined to.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            automerge_enabled: false,
            poll_interval_secs: default_poll_interval(),
            poll_timeout_attempts: default_poll_timeout_attempts(),
            turn_timeout_secs: default_turn_timeout(),
            reliability_low_threshold: default_low_threshold(),
            sandbox_root: default_sandbox_root(),
        }
    }
}

// Serde default functions
fn default_poll_interval() -> u64 {
    30
}

fn default_poll_timeout_attempts() -> u32 {
    40
}

fn default_turn_timeout() -> u64 {
    300
}

fn default_low_threshold() -> f64 {
    0.4
}

fn default_sandbox_root() -> PathBuf {
    PathBuf::from(".")
}

impl AgentConfig {
    /// Load config from a mako.toml file.
    pub fn load(path: &Path) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path).map_err(|source| DriverError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load config, falling back to defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, DriverError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment-variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), DriverError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (env in production, a map in
    /// tests). Unrecognized values are errors, not silent defaults.
    pub fn apply_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), DriverError> {
        if let Some(v) = get("AUTOMERGE_ENABLED") {
            self.automerge_enabled = parse_value("AUTOMERGE_ENABLED", &v)?;
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.poll_interval_secs = parse_value("POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("POLL_TIMEOUT_ATTEMPTS") {
            self.poll_timeout_attempts = parse_value("POLL_TIMEOUT_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("TURN_TIMEOUT") {
            self.turn_timeout_secs = parse_value("TURN_TIMEOUT", &v)?;
        }
        if let Some(v) = get("RELIABILITY_LOW_THRESHOLD") {
            self.reliability_low_threshold = parse_value("RELIABILITY_LOW_THRESHOLD", &v)?;
        }
        if let Some(v) = get("SANDBOX_ROOT") {
            self.sandbox_root = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    /// Persisted goal backlog path, under the sandbox root.
    pub fn goals_path(&self) -> PathBuf {
        self.sandbox_root.join("memory").join("goals.json")
    }

    /// Persisted reliability store path, under the sandbox root.
    pub fn reliability_path(&self) -> PathBuf {
        self.sandbox_root.join("memory").join("tool-reliability.json")
    }

    /// Timing log path, under the sandbox root.
    pub fn timing_path(&self) -> PathBuf {
        self.sandbox_root.join("performance.log")
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DriverError> {
    value.parse().map_err(|_| DriverError::ConfigValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
