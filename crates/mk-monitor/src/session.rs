// session.rs — PollSession: one pending PR being watched.
//
// A session exists only for the duration of a pending PR: created by
// arm(), destroyed by cancel(), or parked in its terminal state so that
// repeated polls are cached no-ops. Sessions are transient — they are
// never persisted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Terminal outcome of a poll session. All four are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The PR merged — the linked goal advances or completes.
    Merged,

    /// The PR was closed without merging.
    ClosedUnmerged,

    /// A CI check failed; carries the failing check's name.
    Failing { check: String },

    /// Poll attempts exceeded the ceiling. Surfaced to the loop as a
    /// retryable anomaly; goal state is left untouched.
    TimedOut,
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Merged => write!(f, "merged"),
            PollOutcome::ClosedUnmerged => write!(f, "closed_unmerged"),
            PollOutcome::Failing { check } => write!(f, "failing({})", check),
            PollOutcome::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// The PR is still open with checks running.
    Pending,

    /// The session reached (or had already reached) a terminal outcome.
    Terminal(PollOutcome),
}

/// A live watch on one branch's pull request.
#[derive(Debug, Clone)]
pub struct PollSession {
    /// Unique id for this session (log correlation).
    pub session_id: Uuid,

    /// The branch being watched.
    pub branch: String,

    /// The linked PR identifier (number or URL).
    pub pr: String,

    /// The goal this PR advances.
    pub goal_id: u64,

    /// Poll attempts made so far.
    pub attempts: u32,

    /// Cached terminal outcome, once reached.
    pub outcome: Option<PollOutcome>,

    /// When the session was armed.
    pub armed_at: DateTime<Utc>,
}

impl PollSession {
    pub fn new(branch: impl Into<String>, pr: impl Into<String>, goal_id: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            branch: branch.into(),
            pr: pr.into(),
            goal_id,
            attempts: 0,
            outcome: None,
            armed_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_pending() {
        let s = PollSession::new("feat/retry", "42", 1);
        assert!(!s.is_terminal());
        assert_eq!(s.attempts, 0);
    }

    #[test]
    fn outcome_display_names() {
        assert_eq!(PollOutcome::Merged.to_string(), "merged");
        assert_eq!(PollOutcome::TimedOut.to_string(), "timed_out");
        assert_eq!(
            PollOutcome::Failing {
                check: "clippy".into()
            }
            .to_string(),
            "failing(clippy)"
        );
    }
}
