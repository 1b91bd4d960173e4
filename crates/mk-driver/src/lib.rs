//! # mk-driver
//!
//! The orchestration loop for Mako.
//!
//! One [`Driver`] turn resolves the focused goal, hands the
//! [`ReasoningEngine`] a bounded [`ActionRequest`] (goal context plus a
//! reliability-ordered tool menu), dispatches the single proposed action,
//! sweeps armed CI poll sessions, and persists. Errors inside a turn are
//! caught at the boundary and queued as anomalies for the next request;
//! the loop exits only on an explicit restart.
//!
//! ## Key components
//!
//! - [`Driver`] / [`TurnOutcome`] — the loop and its per-turn result
//! - [`ReasoningEngine`] / [`ProposedAction`] — the external planner contract
//! - [`AgentConfig`] — mako.toml options with environment overrides

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;

pub use config::AgentConfig;
pub use driver::{Driver, TurnOutcome};
pub use engine::{ActionRequest, ProposedAction, ReasoningEngine, ToolOffer};
pub use error::DriverError;
