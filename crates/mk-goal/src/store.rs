// store.rs — GoalStore: the owned, lockable goal backlog.
//
// The whole backlog lives in one JSON document:
//   { "goals": [...], "completed": [...], "current_focus": 3 }
//
// The store is the sole mutator of goal fields. Every public method takes
// `&self` and serializes access through an internal mutex, so the driver
// and background poll tasks can share one store. Mutations persist the
// document before returning — a restarted process resumes exactly where
// the previous one left off, including the current focus.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::GoalError;
use crate::goal::{Goal, GoalStatus, Priority, STANDING_GOAL_ID};

/// The persisted backlog document.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Backlog {
    goals: Vec<Goal>,
    completed: Vec<Goal>,
    current_focus: Option<u64>,
}

/// Filter for [`GoalStore::list_goals`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GoalFilter {
    pub status: Option<GoalStatus>,
    pub priority: Option<Priority>,
}

/// Persistent store for the goal backlog.
pub struct GoalStore {
    path: PathBuf,
    inner: Mutex<Backlog>,
}

impl GoalStore {
    /// Load the backlog from `path`, creating an empty one (plus the
    /// standing maintenance goal) if the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GoalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GoalError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut backlog = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|source| GoalError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&json)?
        } else {
            Backlog::default()
        };

        // The standing maintenance goal (id 0) is always present.
        if !backlog.goals.iter().any(|g| g.id == STANDING_GOAL_ID) {
            tracing::info!("seeding standing maintenance goal");
            backlog.goals.insert(
                0,
                Goal::new(
                    STANDING_GOAL_ID,
                    "Standing maintenance: keep the monorepo healthy",
                    Priority::Low,
                    Vec::new(),
                ),
            );
        }

        let store = Self {
            path,
            inner: Mutex::new(backlog),
        };
        store.persist()?;
        Ok(store)
    }

    /// Flush the backlog to disk.
    pub fn persist(&self) -> Result<(), GoalError> {
        let backlog = self.lock();
        self.write(&backlog)
    }

    /// Create a new goal. Fails if the description is empty. Ids are
    /// allocated monotonically and never reused, even across completions.
    pub fn create_goal(
        &self,
        description: impl Into<String>,
        priority: Priority,
        subtasks: Vec<String>,
    ) -> Result<Goal, GoalError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(GoalError::Validation(
                "goal description must not be empty".to_string(),
            ));
        }

        let mut backlog = self.lock();
        let next_id = backlog
            .goals
            .iter()
            .chain(backlog.completed.iter())
            .map(|g| g.id)
            .max()
            .map_or(1, |max| max + 1);

        let goal = Goal::new(next_id, description, priority, subtasks);
        backlog.goals.push(goal.clone());
        self.write(&backlog)?;

        tracing::info!(goal_id = goal.id, priority = %goal.priority, "created goal");
        Ok(goal)
    }

    /// Get a goal by id, searching both the active and completed collections.
    pub fn get(&self, id: u64) -> Result<Goal, GoalError> {
        let backlog = self.lock();
        backlog
            .goals
            .iter()
            .chain(backlog.completed.iter())
            .find(|g| g.id == id)
            .cloned()
            .ok_or(GoalError::NotFound(id))
    }

    /// Change a goal's status, appending `note` if given.
    ///
    /// Reaching `completed` moves the goal from the active collection to
    /// the completed collection (moved, not duplicated) and clears focus
    /// if the completed goal held it.
    pub fn update_status(
        &self,
        id: u64,
        new_status: GoalStatus,
        note: Option<&str>,
    ) -> Result<Goal, GoalError> {
        let mut backlog = self.lock();

        let Some(idx) = backlog.goals.iter().position(|g| g.id == id) else {
            // A goal already in the completed collection has no legal moves.
            if let Some(done) = backlog.completed.iter().find(|g| g.id == id) {
                return Err(GoalError::InvalidTransition {
                    goal_id: id,
                    from: done.status.to_string(),
                    to: new_status.to_string(),
                });
            }
            return Err(GoalError::NotFound(id));
        };

        backlog.goals[idx].transition(new_status)?;
        if let Some(note) = note {
            backlog.goals[idx].add_note(note);
        }

        let goal = if new_status == GoalStatus::Completed {
            let goal = backlog.goals.remove(idx);
            backlog.completed.push(goal.clone());
            if backlog.current_focus == Some(id) {
                backlog.current_focus = None;
            }
            tracing::info!(goal_id = id, "goal completed");
            goal
        } else {
            backlog.goals[idx].clone()
        };

        self.write(&backlog)?;
        Ok(goal)
    }

    /// Mark the next pending subtask done and append a note.
    pub fn advance_subtask(&self, id: u64, note: &str) -> Result<Goal, GoalError> {
        let mut backlog = self.lock();
        let goal = Self::active_mut(&mut backlog, id)?;
        goal.advance_subtask()?;
        goal.add_note(note);
        let goal = goal.clone();
        self.write(&backlog)?;
        Ok(goal)
    }

    /// Append a free-text note to a goal.
    pub fn add_note(&self, id: u64, note: &str) -> Result<Goal, GoalError> {
        let mut backlog = self.lock();
        let goal = Self::active_mut(&mut backlog, id)?;
        goal.add_note(note);
        let goal = goal.clone();
        self.write(&backlog)?;
        Ok(goal)
    }

    /// Tie a goal to a pull request and branch.
    pub fn link_pr(&self, id: u64, pr: &str, branch: &str) -> Result<Goal, GoalError> {
        let mut backlog = self.lock();
        let goal = Self::active_mut(&mut backlog, id)?;
        goal.linked_pr = Some(pr.to_string());
        goal.linked_branch = Some(branch.to_string());
        goal.touch();
        let goal = goal.clone();
        self.write(&backlog)?;
        Ok(goal)
    }

    /// Drop the PR link (e.g. the PR was closed without merging). The
    /// branch link stays — the work still exists on that branch.
    pub fn clear_linked_pr(&self, id: u64) -> Result<Goal, GoalError> {
        let mut backlog = self.lock();
        let goal = Self::active_mut(&mut backlog, id)?;
        goal.linked_pr = None;
        goal.touch();
        let goal = goal.clone();
        self.write(&backlog)?;
        Ok(goal)
    }

    /// The one legal path for changing a goal's description.
    pub fn edit_description(&self, id: u64, description: &str) -> Result<Goal, GoalError> {
        if description.trim().is_empty() {
            return Err(GoalError::Validation(
                "goal description must not be empty".to_string(),
            ));
        }
        let mut backlog = self.lock();
        let goal = Self::active_mut(&mut backlog, id)?;
        goal.description = description.to_string();
        goal.touch();
        let goal = goal.clone();
        self.write(&backlog)?;
        Ok(goal)
    }

    /// List active goals matching `filter`, ordered by priority (high
    /// first) then creation time within a tier.
    pub fn list_goals(&self, filter: GoalFilter) -> Vec<Goal> {
        let backlog = self.lock();
        let mut goals: Vec<Goal> = backlog
            .goals
            .iter()
            .filter(|g| filter.status.is_none_or(|s| g.status == s))
            .filter(|g| filter.priority.is_none_or(|p| g.priority == p))
            .cloned()
            .collect();
        goals.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(a.created.cmp(&b.created))
        });
        goals
    }

    /// Snapshot of the completed collection.
    pub fn completed_goals(&self) -> Vec<Goal> {
        self.lock().completed.clone()
    }

    /// Set (or clear) the current focus.
    pub fn set_focus(&self, id: Option<u64>) -> Result<(), GoalError> {
        let mut backlog = self.lock();
        if let Some(id) = id {
            if !backlog.goals.iter().any(|g| g.id == id) {
                return Err(GoalError::NotFound(id));
            }
        }
        backlog.current_focus = id;
        self.write(&backlog)
    }

    /// The goal currently holding focus, if any.
    pub fn get_focus(&self) -> Option<Goal> {
        let backlog = self.lock();
        let id = backlog.current_focus?;
        backlog.goals.iter().find(|g| g.id == id).cloned()
    }

    fn active_mut<'a>(backlog: &'a mut Backlog, id: u64) -> Result<&'a mut Goal, GoalError> {
        backlog
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(GoalError::NotFound(id))
    }

    /// Take the backlog lock, recovering it if a previous holder panicked —
    /// the backlog itself is kept consistent by persisting after mutations.
    fn lock(&self) -> MutexGuard<'_, Backlog> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, backlog: &Backlog) -> Result<(), GoalError> {
        let json = serde_json::to_string_pretty(backlog)?;
        fs::write(&self.path, json).map_err(|source| GoalError::IoError {
            path: self.path.display().to_string(),
            source,
        })
    }
}
