// dispatcher.rs — ToolDispatcher: the single point of tool invocation.
//
// Every side-effecting capability call flows through dispatch():
//
//   1. look up the capability (UnknownTool if unregistered)
//   2. sandbox-check its requested filesystem scope BEFORE execution
//   3. execute on a worker thread under the per-call timeout
//   4. score the outcome with the evaluation policy and record it into
//      the reliability tracker — unconditionally, including sandbox
//      violations and timeouts, so failures show up in future scoring
//
// suggest_order() turns accumulated reliability into a menu ordering for
// the orchestration loop: a bias, never a hard filter.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use mk_reliability::ReliabilityTracker;
use mk_timing::TimingLog;

use crate::capability::Capability;
use crate::error::ToolError;
use crate::sandbox::Sandbox;

/// Scores a call outcome as (success, helpfulness in [0,1]).
pub type EvalPolicy = Box<dyn Fn(&Result<Value, ToolError>) -> (bool, f64) + Send + Sync>;

/// Default evaluation policy: a clean result is a helpful success; scope
/// breaches and timeouts are worthless failures; other errors retain a
/// little credit (the tool ran, the situation may be at fault).
fn default_eval(outcome: &Result<Value, ToolError>) -> (bool, f64) {
    match outcome {
        Ok(_) => (true, 0.9),
        Err(ToolError::SandboxViolation { .. }) | Err(ToolError::Timeout { .. }) => (false, 0.0),
        Err(_) => (false, 0.2),
    }
}

/// Uniform invocation surface over heterogeneous capabilities.
pub struct ToolDispatcher {
    sandbox: Sandbox,
    tracker: Arc<ReliabilityTracker>,
    timing: Arc<TimingLog>,
    /// Capabilities in declaration order — the order breaks score ties.
    tools: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
    call_timeout: Duration,
    eval: EvalPolicy,
}

impl ToolDispatcher {
    pub fn new(
        sandbox: Sandbox,
        tracker: Arc<ReliabilityTracker>,
        timing: Arc<TimingLog>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            sandbox,
            tracker,
            timing,
            tools: Vec::new(),
            index: HashMap::new(),
            call_timeout,
            eval: Box::new(default_eval),
        }
    }

    /// Replace the outcome evaluation policy.
    pub fn with_eval_policy(mut self, eval: EvalPolicy) -> Self {
        self.eval = eval;
        self
    }

    /// Register a capability. Names must be unique.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Result<(), ToolError> {
        let name = capability.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateToolName(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(capability);
        Ok(())
    }

    /// Registered tool names in declaration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Look up a capability for menu building.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// The sandbox all dispatched calls are confined to.
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Dispatch one tool call under `goal_id`.
    ///
    /// The outcome — success or any failure, including a sandbox
    /// violation or timeout — is recorded into the reliability tracker
    /// before this returns.
    pub fn dispatch(
        &self,
        name: &str,
        params: Value,
        goal_id: u64,
    ) -> Result<Value, ToolError> {
        let Some(&idx) = self.index.get(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };
        let capability = &self.tools[idx];

        let outcome = self.timing.time(&format!("tool:{}", name), || {
            match self
                .sandbox
                .check(name, &capability.requested_paths(&params))
            {
                Err(violation) => Err(violation),
                Ok(()) => self.execute_with_timeout(capability, name, params),
            }
        });

        let (success, helpfulness) = (self.eval)(&outcome);
        if let Err(e) = self.tracker.record(name, goal_id, success, helpfulness) {
            tracing::error!(tool = name, error = %e, "failed to record tool invocation");
        }

        match &outcome {
            Ok(_) => tracing::info!(tool = name, goal_id, "tool call succeeded"),
            Err(e) => tracing::warn!(tool = name, goal_id, error = %e, "tool call failed"),
        }
        outcome
    }

    /// Order candidate tools by descending combined reliability score for
    /// `goal_id`; ties fall back to declaration order. Unknown candidates
    /// keep the neutral prior and sort after known ties.
    pub fn suggest_order(&self, candidates: &[String], goal_id: u64) -> Vec<String> {
        let mut scored: Vec<(f64, usize, String)> = candidates
            .iter()
            .map(|name| {
                let decl = self.index.get(name).copied().unwrap_or(usize::MAX);
                (self.tracker.score(name, Some(goal_id)), decl, name.clone())
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.into_iter().map(|(_, _, name)| name).collect()
    }

    /// Run the capability on a worker thread, bounding the wait. A call
    /// that outlives the deadline is abandoned — its thread finishes in
    /// the background and the result is discarded.
    fn execute_with_timeout(
        &self,
        capability: &Arc<dyn Capability>,
        name: &str,
        params: Value,
    ) -> Result<Value, ToolError> {
        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(capability);
        thread::spawn(move || {
            let _ = tx.send(worker.execute(params));
        });

        match rx.recv_timeout(self.call_timeout) {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: name.to_string(),
                secs: self.call_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    struct Echo;

    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its parameters"
        }
        fn params_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(&self, params: Value) -> Result<Value, ToolError> {
            Ok(params)
        }
    }

    struct Escapee;

    impl Capability for Escapee {
        fn name(&self) -> &str {
            "escapee"
        }
        fn description(&self) -> &str {
            "tries to leave the sandbox"
        }
        fn params_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        fn requested_paths(&self, _params: &Value) -> Vec<PathBuf> {
            vec![PathBuf::from("/etc/passwd")]
        }
        fn execute(&self, _params: Value) -> Result<Value, ToolError> {
            // Must never run — the sandbox check precedes execution.
            panic!("escapee executed despite sandbox violation");
        }
    }

    struct Sleepy;

    impl Capability for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "sleeps past the deadline"
        }
        fn params_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(&self, _params: Value) -> Result<Value, ToolError> {
            thread::sleep(Duration::from_secs(5));
            Ok(Value::Null)
        }
    }

    struct Flaky;

    impl Capability for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn params_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(&self, _params: Value) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed("boom".to_string()))
        }
    }

    fn make_dispatcher(root: &Path) -> ToolDispatcher {
        let sandbox = Sandbox::new(root).unwrap();
        let tracker =
            Arc::new(ReliabilityTracker::load(root.join("tool-reliability.json")).unwrap());
        let timing = Arc::new(TimingLog::open(root.join("performance.log")).unwrap());
        ToolDispatcher::new(sandbox, tracker, timing, Duration::from_millis(200))
    }

    #[test]
    fn dispatch_runs_registered_capability() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Echo)).unwrap();

        let result = dispatcher
            .dispatch("echo", serde_json::json!({"x": 1}), 1)
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Echo)).unwrap();
        assert!(matches!(
            dispatcher.register(Arc::new(Echo)),
            Err(ToolError::DuplicateToolName(_))
        ));
    }

    #[test]
    fn unknown_tool_rejected() {
        let dir = tempdir().unwrap();
        let dispatcher = make_dispatcher(dir.path());
        assert!(matches!(
            dispatcher.dispatch("nope", Value::Null, 1),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn sandbox_violation_recorded_as_failure() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Escapee)).unwrap();

        let err = dispatcher.dispatch("escapee", Value::Null, 1).unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation { .. }));

        // Recorded as a failure with zero helpfulness, never as a success.
        let tracker =
            ReliabilityTracker::load(dir.path().join("tool-reliability.json")).unwrap();
        assert!(tracker.score("escapee", Some(1)) < 0.5);
    }

    #[test]
    fn timeout_recorded_as_failure() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Sleepy)).unwrap();

        let err = dispatcher.dispatch("sleepy", Value::Null, 3).unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));

        let tracker =
            ReliabilityTracker::load(dir.path().join("tool-reliability.json")).unwrap();
        assert!(tracker.score("sleepy", Some(3)) < 0.5);
    }

    #[test]
    fn suggest_order_prefers_reliable_tools() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Flaky)).unwrap();
        dispatcher.register(Arc::new(Echo)).unwrap();

        // Build history: flaky fails, echo succeeds.
        for _ in 0..3 {
            let _ = dispatcher.dispatch("flaky", Value::Null, 1);
            let _ = dispatcher.dispatch("echo", serde_json::json!({}), 1);
        }

        let order =
            dispatcher.suggest_order(&["flaky".to_string(), "echo".to_string()], 1);
        assert_eq!(order, vec!["echo".to_string(), "flaky".to_string()]);
    }

    #[test]
    fn suggest_order_breaks_ties_by_declaration_order() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Flaky)).unwrap();
        dispatcher.register(Arc::new(Echo)).unwrap();

        // No history: both score the neutral prior.
        let order =
            dispatcher.suggest_order(&["echo".to_string(), "flaky".to_string()], 1);
        assert_eq!(order, vec!["flaky".to_string(), "echo".to_string()]);
    }

    #[test]
    fn timing_log_gets_one_line_per_dispatch() {
        let dir = tempdir().unwrap();
        let mut dispatcher = make_dispatcher(dir.path());
        dispatcher.register(Arc::new(Echo)).unwrap();
        dispatcher
            .dispatch("echo", serde_json::json!({}), 1)
            .unwrap();

        let records = TimingLog::read_all(dir.path().join("performance.log")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_name, "tool:echo");
    }
}
