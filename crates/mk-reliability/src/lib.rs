//! # mk-reliability
//!
//! Tool reliability scoring for Mako.
//!
//! Every dispatched tool call is scored (success + helpfulness) and folded
//! into running aggregates — one global per tool, one per (tool, goal)
//! pair. The orchestration loop uses the blended [`ReliabilityTracker::score`]
//! to bias which tools the reasoning engine is offered first; it never
//! hard-disables a tool.
//!
//! ## Key components
//!
//! - [`ReliabilityTracker`] — records outcomes, serves blended scores
//! - [`ToolStats`] / [`ToolRecord`] — the persisted running aggregates

pub mod error;
pub mod tracker;

pub use error::ReliabilityError;
pub use tracker::{ReliabilityTracker, ToolRecord, ToolStats, NEUTRAL_PRIOR};
