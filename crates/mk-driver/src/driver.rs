// driver.rs — the orchestration loop. One iteration = one turn.
//
// A turn: resolve focus, build a bounded action request, ask the engine
// for one action, dispatch it, sweep armed poll sessions, persist.
// Every error inside a turn is caught at the turn boundary, logged, and
// queued as an anomaly for the next request — the loop never dies on a
// bad turn. The only intentional exit is an explicit Restart action,
// which flushes both stores first.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use mk_goal::{Goal, GoalFilter, GoalStatus, GoalStore};
use mk_monitor::{CiMonitor, PollOutcome, PollStatus};
use mk_reliability::ReliabilityTracker;
use mk_tools::ToolDispatcher;

use crate::config::AgentConfig;
use crate::engine::{ActionRequest, ProposedAction, ReasoningEngine, ToolOffer};
use crate::error::DriverError;

/// What one turn amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A tool call was dispatched.
    Acted,
    /// A note was appended, nothing dispatched.
    Noted,
    /// The engine declined to act.
    Idle,
    /// The engine requested a process replacement; stores are flushed.
    Restart,
    /// An error was caught at the turn boundary and queued as an anomaly.
    Faulted,
}

pub struct Driver {
    config: AgentConfig,
    store: Arc<GoalStore>,
    tracker: Arc<ReliabilityTracker>,
    dispatcher: Arc<ToolDispatcher>,
    monitor: Arc<CiMonitor>,
    engine: Arc<dyn ReasoningEngine>,
    /// Anomalies queued for the next request (poll timeouts, caught
    /// turn errors). Drained once per turn.
    anomalies: Mutex<Vec<String>>,
}

impl Driver {
    pub fn new(
        config: AgentConfig,
        store: Arc<GoalStore>,
        tracker: Arc<ReliabilityTracker>,
        dispatcher: Arc<ToolDispatcher>,
        monitor: Arc<CiMonitor>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        Self {
            config,
            store,
            tracker,
            dispatcher,
            monitor,
            engine,
            anomalies: Mutex::new(Vec::new()),
        }
    }

    /// Run turns until the engine requests a restart. Sleeps the poll
    /// interval between turns.
    pub fn run(&self) -> Result<(), DriverError> {
        loop {
            if self.turn() == TurnOutcome::Restart {
                return Ok(());
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    /// Execute one turn, catching everything at the boundary.
    pub fn turn(&self) -> TurnOutcome {
        match self.run_turn() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                self.queue_anomaly(format!("previous turn failed: {}", e));
                TurnOutcome::Faulted
            }
        }
    }

    fn run_turn(&self) -> Result<TurnOutcome, DriverError> {
        let goal = self.select_focus()?;
        let request = self.build_request(goal);
        tracing::debug!(goal_id = request.goal.id, tools = request.tools.len(), "turn start");

        let action = self.propose_with_timeout(request)?;
        let outcome = self.apply(action)?;

        if outcome == TurnOutcome::Restart {
            self.flush()?;
            return Ok(outcome);
        }

        self.sweep_poll_sessions();
        self.flush()?;
        Ok(outcome)
    }

    /// Persisted focus wins; otherwise the highest-priority non-blocked
    /// goal, preferring in-progress over fresh active within a tier.
    fn select_focus(&self) -> Result<Goal, DriverError> {
        if let Some(goal) = self.store.get_focus() {
            return Ok(goal);
        }

        // list_goals is already (priority, created)-ordered.
        let goals = self.store.list_goals(GoalFilter::default());
        let candidates: Vec<&Goal> = goals
            .iter()
            .filter(|g| g.status != GoalStatus::Blocked)
            .collect();
        let top_priority = candidates
            .first()
            .map(|g| g.priority)
            .ok_or(DriverError::NoActionableGoal)?;

        let goal = candidates
            .iter()
            .filter(|g| g.priority == top_priority)
            .find(|g| g.status == GoalStatus::InProgress)
            .or(candidates.first())
            .copied()
            .cloned()
            .ok_or(DriverError::NoActionableGoal)?;
        self.store.set_focus(Some(goal.id))?;
        tracing::info!(goal_id = goal.id, "focus selected");
        Ok(goal)
    }

    fn build_request(&self, goal: Goal) -> ActionRequest {
        let names = self.dispatcher.tool_names();
        let ordered = self.dispatcher.suggest_order(&names, goal.id);
        let tools = ordered
            .iter()
            .filter_map(|name| self.dispatcher.get(name))
            .map(|cap| ToolOffer {
                name: cap.name().to_string(),
                description: cap.description().to_string(),
                schema: cap.params_schema(),
                score: self.tracker.score(cap.name(), Some(goal.id)),
            })
            .collect();
        let low_reliability = self
            .tracker
            .low_reliability(self.config.reliability_low_threshold)
            .into_iter()
            .collect();

        ActionRequest {
            goal,
            tools,
            low_reliability,
            anomalies: self.drain_anomalies(),
        }
    }

    /// The engine call may block arbitrarily long; bound it with the
    /// turn timeout on a worker thread. A timed-out call is abandoned.
    fn propose_with_timeout(&self, request: ActionRequest) -> Result<ProposedAction, DriverError> {
        let (tx, rx) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        thread::spawn(move || {
            let _ = tx.send(engine.propose(&request));
        });

        match rx.recv_timeout(self.config.turn_timeout()) {
            Ok(result) => result,
            Err(_) => Err(DriverError::EngineTimeout {
                secs: self.config.turn_timeout_secs,
            }),
        }
    }

    fn apply(&self, action: ProposedAction) -> Result<TurnOutcome, DriverError> {
        match action {
            ProposedAction::ToolCall { name, params } => {
                let goal_id = self
                    .store
                    .get_focus()
                    .map(|g| g.id)
                    .unwrap_or(mk_goal::STANDING_GOAL_ID);
                match self.dispatcher.dispatch(&name, params, goal_id) {
                    Ok(result) => {
                        if let Some((branch, pr)) = extract_pr(&result) {
                            self.arm_for(goal_id, &branch, &pr);
                        }
                    }
                    // Dispatch failures are recorded by the dispatcher;
                    // here they only become context for the next turn.
                    Err(e) => {
                        self.queue_anomaly(format!("tool {} failed: {}", name, e));
                    }
                }
                Ok(TurnOutcome::Acted)
            }
            ProposedAction::Note(text) => {
                if let Some(goal) = self.store.get_focus() {
                    self.store.add_note(goal.id, &text)?;
                }
                Ok(TurnOutcome::Noted)
            }
            ProposedAction::Restart => {
                tracing::info!("restart requested by engine");
                Ok(TurnOutcome::Restart)
            }
            ProposedAction::Idle => Ok(TurnOutcome::Idle),
        }
    }

    /// Link the PR to the goal and arm a poll session for the branch.
    fn arm_for(&self, goal_id: u64, branch: &str, pr: &str) {
        if let Err(e) = self.store.link_pr(goal_id, pr, branch) {
            tracing::warn!(goal_id, error = %e, "could not link PR to goal");
        }
        match self.monitor.arm(branch, pr, goal_id) {
            Ok(session_id) => {
                tracing::info!(branch, pr, %session_id, "poll session armed");
            }
            Err(e) => {
                self.queue_anomaly(format!("could not arm poll for {}: {}", branch, e));
            }
        }
    }

    /// Poll every live session once. Terminal outcomes mutate goals via
    /// the monitor; timeouts become anomalies for the engine.
    pub fn sweep_poll_sessions(&self) {
        for branch in self.monitor.pending_branches() {
            match self.monitor.poll_once(&branch, &self.store) {
                Ok(PollStatus::Terminal(PollOutcome::TimedOut)) => {
                    self.queue_anomaly(format!("CI polling timed out for branch {}", branch));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(branch = %branch, error = %e, "poll failed");
                    self.queue_anomaly(format!("poll failed for {}: {}", branch, e));
                }
            }
        }
    }

    /// Flush both persisted stores.
    pub fn flush(&self) -> Result<(), DriverError> {
        self.store.persist()?;
        self.tracker.persist()?;
        Ok(())
    }

    pub fn queue_anomaly(&self, anomaly: String) {
        self.lock_anomalies().push(anomaly);
    }

    fn drain_anomalies(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock_anomalies())
    }

    fn lock_anomalies(&self) -> MutexGuard<'_, Vec<String>> {
        self.anomalies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A tool result that names both a branch and a PR arms the monitor.
fn extract_pr(result: &serde_json::Value) -> Option<(String, String)> {
    let branch = result.get("branch")?.as_str()?.to_string();
    let pr = match result.get("pr_number") {
        Some(n) if n.is_u64() => n.to_string(),
        Some(s) => s.as_str()?.to_string(),
        None => result.get("pr_url")?.as_str()?.to_string(),
    };
    Some((branch, pr))
}
