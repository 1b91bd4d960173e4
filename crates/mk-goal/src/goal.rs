// goal.rs — Goal: one unit of backlog work.
//
// A Goal carries a human-readable description, a priority tier, an ordered
// list of subtasks, and an append-only notes log. Its status moves through
// a small state machine:
//
//   active → in-progress → completed
//   active → blocked, in-progress → blocked, blocked → in-progress
//
// `completed` is terminal. Goal id 0 is the permanent standing-maintenance
// goal and can never reach `completed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GoalError;

/// Marker prefix for a finished subtask. Subtasks stay plain strings in the
/// persisted document, so completion is a textual prefix rather than a flag.
pub const DONE_PREFIX: &str = "[done] ";

/// The id reserved for the permanent standing-maintenance goal.
pub const STANDING_GOAL_ID: u64 = 0;

/// The status of a goal in the backlog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    /// In the backlog, no work started yet.
    Active,

    /// Work is underway (a branch may be in flight).
    InProgress,

    /// Finished — the linked PR reached a merged state. Terminal.
    Completed,

    /// Stopped on an external blocker (failing CI, unresolved dependency).
    Blocked,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::InProgress => write!(f, "in-progress"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl GoalStatus {
    /// Check whether transitioning from this status to `next` is valid.
    ///
    /// The valid transitions form a directed graph:
    ///   active → in-progress (work started)
    ///   in-progress → completed (linked PR merged)
    ///   in-progress → blocked, active → blocked (blocker hit)
    ///   blocked → in-progress (blocker cleared)
    ///
    /// `completed` has no outgoing edges. Unblocking always resumes
    /// in-progress; there is no blocked → active edge.
    pub fn can_transition_to(&self, next: &GoalStatus) -> bool {
        matches!(
            (self, next),
            (GoalStatus::Active, GoalStatus::InProgress)
                | (GoalStatus::Active, GoalStatus::Blocked)
                | (GoalStatus::InProgress, GoalStatus::Completed)
                | (GoalStatus::InProgress, GoalStatus::Blocked)
                | (GoalStatus::Blocked, GoalStatus::InProgress)
        )
    }
}

/// Priority tier for backlog ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, high first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// A unit of backlog work.
///
/// Field names and shapes match the persisted `goals.json` document exactly
/// — subtasks and notes are plain string lists, timestamps are ISO-8601.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique id within the store. Never reused; 0 is the standing goal.
    pub id: u64,

    /// Human-readable description of the work.
    pub description: String,

    /// Current status.
    pub status: GoalStatus,

    /// Priority tier.
    pub priority: Priority,

    /// Ordered subtasks. Finished items carry the `[done] ` prefix.
    pub subtasks: Vec<String>,

    /// Append-only free-text annotations.
    pub notes: Vec<String>,

    /// Linked pull request identifier (number or URL), if any.
    pub linked_pr: Option<String>,

    /// Linked branch name, if any.
    pub linked_branch: Option<String>,

    /// When this goal was created.
    pub created: DateTime<Utc>,

    /// When this goal was last mutated.
    pub last_updated: DateTime<Utc>,
}

impl Goal {
    /// Create a new goal in the `active` status.
    pub fn new(
        id: u64,
        description: impl Into<String>,
        priority: Priority,
        subtasks: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            description: description.into(),
            status: GoalStatus::Active,
            priority,
            subtasks,
            notes: Vec::new(),
            linked_pr: None,
            linked_branch: None,
            created: now,
            last_updated: now,
        }
    }

    /// Refresh `last_updated`. Called by every mutation.
    pub(crate) fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Transition to a new status. Returns an error if the move is illegal
    /// or would complete the standing goal.
    pub fn transition(&mut self, new_status: GoalStatus) -> Result<(), GoalError> {
        let standing_completion =
            self.id == STANDING_GOAL_ID && new_status == GoalStatus::Completed;
        if standing_completion || !self.status.can_transition_to(&new_status) {
            return Err(GoalError::InvalidTransition {
                goal_id: self.id,
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }
        self.status = new_status;
        self.touch();
        Ok(())
    }

    /// Append a note.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
        self.touch();
    }

    /// Mark the next pending subtask done. Fails when none are pending —
    /// the caller should request completion instead.
    pub fn advance_subtask(&mut self) -> Result<&str, GoalError> {
        let idx = self
            .subtasks
            .iter()
            .position(|s| !s.starts_with(DONE_PREFIX))
            .ok_or(GoalError::NoSubtasksRemaining(self.id))?;
        self.subtasks[idx] = format!("{}{}", DONE_PREFIX, self.subtasks[idx]);
        self.touch();
        Ok(&self.subtasks[idx])
    }

    /// Count of subtasks not yet marked done.
    pub fn pending_subtasks(&self) -> usize {
        self.subtasks
            .iter()
            .filter(|s| !s.starts_with(DONE_PREFIX))
            .count()
    }
}
