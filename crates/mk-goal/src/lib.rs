//! # mk-goal
//!
//! Goal backlog management for Mako.
//!
//! A [`Goal`] is one unit of backlog work: description, priority tier,
//! ordered subtasks, append-only notes, and optional PR/branch links. The
//! status state machine enforces a valid lifecycle from `active` through
//! `in-progress` to `completed`, with `blocked` as a resumable detour.
//!
//! ## Key components
//!
//! - [`Goal`] / [`GoalStatus`] — the work unit and its state machine
//! - [`GoalStore`] — the owned, lockable backlog with JSON persistence
//!   (`{goals, completed, current_focus}` in one document)
//! - [`GoalFilter`] — status/priority filtering for backlog listings
//!
//! Goal id 0 is the permanent standing-maintenance goal: always present,
//! never completed, never deleted.

pub mod error;
pub mod goal;
pub mod store;

pub use error::GoalError;
pub use goal::{Goal, GoalStatus, Priority, DONE_PREFIX, STANDING_GOAL_ID};
pub use store::{GoalFilter, GoalStore};
