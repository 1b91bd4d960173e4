// engine.rs — ReasoningEngine: the contract with the external planner.
//
// The engine is opaque: it receives one bounded ActionRequest and answers
// with one ProposedAction. Prompting, model choice, and sampling are its
// business; the loop only supplies goal context, a reliability-ordered
// tool menu, and any pending anomalies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mk_goal::Goal;

use crate::error::DriverError;

/// One tool the engine may pick, with its schema and current score.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOffer {
    pub name: String,
    pub description: String,
    pub schema: Value,
    /// Combined reliability score for the focused goal, in [0,1].
    pub score: f64,
}

/// Everything the engine sees for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    /// The focused goal.
    pub goal: Goal,

    /// Tool menu, best-scoring first. A bias, never a hard filter.
    pub tools: Vec<ToolOffer>,

    /// Tools whose global score fell below the configured threshold.
    pub low_reliability: Vec<String>,

    /// Pending anomalies from earlier turns (poll timeouts, caught
    /// errors) the engine should factor in.
    pub anomalies: Vec<String>,
}

/// The engine's answer for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProposedAction {
    /// Invoke a registered tool with these parameters.
    ToolCall { name: String, params: Value },

    /// Append a note to the focused goal without acting.
    Note(String),

    /// Request a clean process replacement.
    Restart,

    /// Nothing worth doing this turn.
    Idle,
}

/// External reasoning collaborator. May block arbitrarily long; the loop
/// bounds the wait with the turn timeout.
pub trait ReasoningEngine: Send + Sync {
    fn propose(&self, request: &ActionRequest) -> Result<ProposedAction, DriverError>;
}
