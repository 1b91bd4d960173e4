// monitor.rs — CiMonitor: armed poll sessions and goal advancement.
//
// One session per in-flight branch. Polling maps provider snapshots to
// terminal outcomes and drives the linked goal through the Goal Store's
// public contract — the monitor never edits goal fields directly.
// Goal completion happens here and only here: a goal finishes when its
// PR is verifiably merged, never on the reasoning engine's say-so.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use mk_goal::{GoalStatus, GoalStore};

use crate::error::MonitorError;
use crate::provider::{PrState, StatusProvider};
use crate::session::{PollOutcome, PollSession, PollStatus};

/// Watches armed branches and advances their linked goals.
pub struct CiMonitor {
    provider: Arc<dyn StatusProvider>,
    /// Sessions by branch. Terminal sessions stay registered so repeated
    /// polls return the cache and re-arming the branch is rejected.
    sessions: Mutex<HashMap<String, PollSession>>,
    /// Poll-attempt ceiling before a session times out.
    max_attempts: u32,
}

impl CiMonitor {
    pub fn new(provider: Arc<dyn StatusProvider>, max_attempts: u32) -> Self {
        Self {
            provider,
            sessions: Mutex::new(HashMap::new()),
            max_attempts,
        }
    }

    /// Start watching `branch` for the PR that advances `goal_id`.
    pub fn arm(
        &self,
        branch: &str,
        pr: &str,
        linked_goal_id: u64,
    ) -> Result<uuid::Uuid, MonitorError> {
        let mut sessions = self.lock();
        if sessions.contains_key(branch) {
            return Err(MonitorError::AlreadyArmed(branch.to_string()));
        }
        let session = PollSession::new(branch, pr, linked_goal_id);
        let id = session.session_id;
        tracing::info!(branch, pr, goal_id = linked_goal_id, %id, "armed poll session");
        sessions.insert(branch.to_string(), session);
        Ok(id)
    }

    /// Remove a pending session without touching goal state.
    pub fn cancel(&self, branch: &str) -> Result<(), MonitorError> {
        let mut sessions = self.lock();
        match sessions.get(branch) {
            None => Err(MonitorError::NoSession(branch.to_string())),
            Some(s) if s.is_terminal() => Err(MonitorError::AlreadyTerminal(branch.to_string())),
            Some(_) => {
                sessions.remove(branch);
                tracing::info!(branch, "cancelled poll session");
                Ok(())
            }
        }
    }

    /// Branches with live (non-terminal) sessions.
    pub fn pending_branches(&self) -> Vec<String> {
        self.lock()
            .values()
            .filter(|s| !s.is_terminal())
            .map(|s| s.branch.clone())
            .collect()
    }

    /// Poll one session. Terminal sessions return the cached outcome
    /// without re-querying the provider or mutating the store.
    ///
    /// The session table lock is held across the provider query, which
    /// serializes polls — intentional, since concurrent polls of one
    /// branch must not double-apply goal mutations.
    pub fn poll_once(
        &self,
        branch: &str,
        store: &GoalStore,
    ) -> Result<PollStatus, MonitorError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(branch)
            .ok_or_else(|| MonitorError::NoSession(branch.to_string()))?;

        if let Some(outcome) = &session.outcome {
            return Ok(PollStatus::Terminal(outcome.clone()));
        }

        session.attempts += 1;
        let snapshot = self.provider.snapshot(&session.pr)?;

        let status = match snapshot.state {
            PrState::Merged => {
                apply_merged(store, session);
                PollStatus::Terminal(PollOutcome::Merged)
            }
            PrState::Closed => {
                let note = format!("PR {} closed without merging", session.pr);
                note_goal(store, session.goal_id, &note);
                if let Err(e) = store.clear_linked_pr(session.goal_id) {
                    tracing::warn!(goal_id = session.goal_id, error = %e, "could not clear PR link");
                }
                PollStatus::Terminal(PollOutcome::ClosedUnmerged)
            }
            PrState::Open => match snapshot.failing_check {
                Some(check) => {
                    let note = format!("blocked: CI check '{}' failing on PR {}", check, session.pr);
                    if let Err(e) =
                        store.update_status(session.goal_id, GoalStatus::Blocked, Some(&note))
                    {
                        tracing::warn!(goal_id = session.goal_id, error = %e, "could not block goal");
                        note_goal(store, session.goal_id, &note);
                    }
                    PollStatus::Terminal(PollOutcome::Failing { check })
                }
                None if session.attempts >= self.max_attempts => {
                    // Retryable anomaly for the loop; goal state untouched.
                    PollStatus::Terminal(PollOutcome::TimedOut)
                }
                None => PollStatus::Pending,
            },
        };

        if let PollStatus::Terminal(outcome) = &status {
            tracing::info!(branch, outcome = %outcome, attempts = session.attempts, "poll session terminal");
            session.outcome = Some(outcome.clone());
        }
        Ok(status)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PollSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Merged PR: advance the next subtask if any remain, otherwise complete
/// the goal. The store refuses to complete the standing goal — that case
/// (and any other illegal transition) downgrades to a note.
fn apply_merged(store: &GoalStore, session: &PollSession) {
    let note = format!("PR {} merged (branch {})", session.pr, session.branch);
    let pending = store.get(session.goal_id).map(|g| g.pending_subtasks());

    let result = match pending {
        Ok(n) if n > 0 => store.advance_subtask(session.goal_id, &note).map(|_| ()),
        Ok(_) => store
            .update_status(session.goal_id, GoalStatus::Completed, Some(&note))
            .map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::warn!(goal_id = session.goal_id, error = %e, "could not advance goal on merge");
        note_goal(store, session.goal_id, &note);
    }
}

fn note_goal(store: &GoalStore, goal_id: u64, note: &str) {
    if let Err(e) = store.add_note(goal_id, note) {
        tracing::warn!(goal_id, error = %e, "could not append note");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PrSnapshot;
    use mk_goal::{GoalFilter, Priority, STANDING_GOAL_ID};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    /// Provider whose snapshot is set by the test; counts queries.
    struct FakeProvider {
        snapshot: Mutex<PrSnapshot>,
        queries: AtomicU32,
    }

    impl FakeProvider {
        fn new(snapshot: PrSnapshot) -> Self {
            Self {
                snapshot: Mutex::new(snapshot),
                queries: AtomicU32::new(0),
            }
        }

        fn set(&self, snapshot: PrSnapshot) {
            *self.snapshot.lock().unwrap() = snapshot;
        }

        fn query_count(&self) -> u32 {
            self.queries.load(Ordering::SeqCst)
        }
    }

    impl StatusProvider for FakeProvider {
        fn snapshot(&self, _pr: &str) -> Result<PrSnapshot, MonitorError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.lock().unwrap().clone())
        }
    }

    fn open_snapshot() -> PrSnapshot {
        PrSnapshot {
            state: PrState::Open,
            failing_check: None,
            checks_pending: true,
        }
    }

    fn merged_snapshot() -> PrSnapshot {
        PrSnapshot {
            state: PrState::Merged,
            failing_check: None,
            checks_pending: false,
        }
    }

    fn setup(
        snapshot: PrSnapshot,
        max_attempts: u32,
    ) -> (tempfile::TempDir, GoalStore, Arc<FakeProvider>, CiMonitor) {
        let dir = tempdir().unwrap();
        let store = GoalStore::load(dir.path().join("goals.json")).unwrap();
        let provider = Arc::new(FakeProvider::new(snapshot));
        let monitor = CiMonitor::new(provider.clone() as Arc<dyn StatusProvider>, max_attempts);
        (dir, store, provider, monitor)
    }

    #[test]
    fn merged_pr_completes_goal_and_clears_focus() {
        let (_dir, store, _provider, monitor) = setup(merged_snapshot(), 10);
        let goal = store.create_goal("add retry logic", Priority::High, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();
        store.link_pr(goal.id, "7", "feat/retry").unwrap();
        store.set_focus(Some(goal.id)).unwrap();

        monitor.arm("feat/retry", "7", goal.id).unwrap();
        let status = monitor.poll_once("feat/retry", &store).unwrap();
        assert_eq!(status, PollStatus::Terminal(PollOutcome::Merged));

        let completed = store.completed_goals();
        assert_eq!(completed.iter().filter(|g| g.id == goal.id).count(), 1);
        assert!(store
            .list_goals(GoalFilter::default())
            .iter()
            .all(|g| g.id != goal.id));
        assert!(store.get_focus().is_none());
    }

    #[test]
    fn merged_with_pending_subtasks_advances_instead() {
        let (_dir, store, _provider, monitor) = setup(merged_snapshot(), 10);
        let goal = store
            .create_goal(
                "retry logic",
                Priority::High,
                vec!["write test".into(), "implement".into()],
            )
            .unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("feat/retry", "7", goal.id).unwrap();
        monitor.poll_once("feat/retry", &store).unwrap();

        let goal = store.get(goal.id).unwrap();
        assert_eq!(goal.status, GoalStatus::InProgress);
        assert_eq!(goal.pending_subtasks(), 1);
        assert!(goal.subtasks[0].starts_with("[done] "));
    }

    #[test]
    fn failing_check_blocks_goal_with_note() {
        let (_dir, store, _provider, monitor) = setup(
            PrSnapshot {
                state: PrState::Open,
                failing_check: Some("clippy".into()),
                checks_pending: false,
            },
            10,
        );
        let goal = store.create_goal("lint fixes", Priority::Medium, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("fix/lint", "9", goal.id).unwrap();
        let status = monitor.poll_once("fix/lint", &store).unwrap();
        assert_eq!(
            status,
            PollStatus::Terminal(PollOutcome::Failing {
                check: "clippy".into()
            })
        );

        let goal = store.get(goal.id).unwrap();
        assert_eq!(goal.status, GoalStatus::Blocked);
        assert!(goal.notes.iter().any(|n| n.contains("clippy")));
    }

    #[test]
    fn closed_unmerged_keeps_status_and_clears_pr_link() {
        let (_dir, store, _provider, monitor) = setup(
            PrSnapshot {
                state: PrState::Closed,
                failing_check: None,
                checks_pending: false,
            },
            10,
        );
        let goal = store.create_goal("abandoned", Priority::Low, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();
        store.link_pr(goal.id, "11", "feat/abandoned").unwrap();

        monitor.arm("feat/abandoned", "11", goal.id).unwrap();
        let status = monitor.poll_once("feat/abandoned", &store).unwrap();
        assert_eq!(status, PollStatus::Terminal(PollOutcome::ClosedUnmerged));

        let goal = store.get(goal.id).unwrap();
        assert_eq!(goal.status, GoalStatus::InProgress);
        assert!(goal.linked_pr.is_none());
        assert!(goal.notes.iter().any(|n| n.contains("closed")));
    }

    #[test]
    fn times_out_after_attempt_ceiling_without_goal_mutation() {
        let (_dir, store, _provider, monitor) = setup(open_snapshot(), 2);
        let goal = store.create_goal("slow ci", Priority::High, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("feat/slow", "13", goal.id).unwrap();
        assert_eq!(
            monitor.poll_once("feat/slow", &store).unwrap(),
            PollStatus::Pending
        );
        assert_eq!(
            monitor.poll_once("feat/slow", &store).unwrap(),
            PollStatus::Terminal(PollOutcome::TimedOut)
        );

        let goal = store.get(goal.id).unwrap();
        assert_eq!(goal.status, GoalStatus::InProgress);
        assert!(goal.notes.is_empty());
    }

    #[test]
    fn polls_after_terminal_are_cached_no_ops() {
        let (_dir, store, provider, monitor) = setup(merged_snapshot(), 10);
        let goal = store.create_goal("done deal", Priority::High, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("feat/done", "5", goal.id).unwrap();
        monitor.poll_once("feat/done", &store).unwrap();
        let queries_after_first = provider.query_count();

        // Flip the provider to a failing state; cached outcome must win.
        provider.set(PrSnapshot {
            state: PrState::Open,
            failing_check: Some("broken".into()),
            checks_pending: false,
        });
        let status = monitor.poll_once("feat/done", &store).unwrap();
        assert_eq!(status, PollStatus::Terminal(PollOutcome::Merged));
        assert_eq!(provider.query_count(), queries_after_first);

        // And no further goal mutation happened.
        let completed = store.completed_goals();
        assert_eq!(completed.iter().filter(|g| g.id == goal.id).count(), 1);
    }

    #[test]
    fn arming_an_armed_branch_is_rejected() {
        let (_dir, store, _provider, monitor) = setup(merged_snapshot(), 10);
        let goal = store.create_goal("one branch", Priority::High, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("feat/x", "1", goal.id).unwrap();
        assert!(matches!(
            monitor.arm("feat/x", "1", goal.id),
            Err(MonitorError::AlreadyArmed(_))
        ));

        // Still rejected after the session goes terminal.
        monitor.poll_once("feat/x", &store).unwrap();
        assert!(matches!(
            monitor.arm("feat/x", "2", goal.id),
            Err(MonitorError::AlreadyArmed(_))
        ));
    }

    #[test]
    fn cancel_removes_pending_only() {
        let (_dir, store, _provider, monitor) = setup(open_snapshot(), 10);
        let goal = store.create_goal("cancelable", Priority::High, vec![]).unwrap();
        store.update_status(goal.id, GoalStatus::InProgress, None).unwrap();

        monitor.arm("feat/c", "3", goal.id).unwrap();
        monitor.cancel("feat/c").unwrap();
        assert!(matches!(
            monitor.poll_once("feat/c", &store),
            Err(MonitorError::NoSession(_))
        ));
        assert!(matches!(
            monitor.cancel("feat/c"),
            Err(MonitorError::NoSession(_))
        ));

        // Goal state untouched by cancellation.
        assert_eq!(store.get(goal.id).unwrap().status, GoalStatus::InProgress);
    }

    #[test]
    fn standing_goal_merge_becomes_note_not_completion() {
        let (_dir, store, _provider, monitor) = setup(merged_snapshot(), 10);
        store
            .update_status(STANDING_GOAL_ID, GoalStatus::InProgress, None)
            .unwrap();

        monitor.arm("chore/upkeep", "21", STANDING_GOAL_ID).unwrap();
        let status = monitor.poll_once("chore/upkeep", &store).unwrap();
        assert_eq!(status, PollStatus::Terminal(PollOutcome::Merged));

        let standing = store.get(STANDING_GOAL_ID).unwrap();
        assert_eq!(standing.status, GoalStatus::InProgress);
        assert!(standing.notes.iter().any(|n| n.contains("merged")));
        assert!(store.completed_goals().is_empty());
    }
}
