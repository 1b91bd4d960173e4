//! # mk-monitor
//!
//! CI/PR advancement monitoring for Mako.
//!
//! After the agent pushes a branch and opens a PR, a [`PollSession`] is
//! armed for that branch. Each poll asks the [`StatusProvider`] for a
//! [`PrSnapshot`] and maps it to one of four terminal outcomes: merged,
//! closed-unmerged, failing check, or timed out. A merged PR is the only
//! path by which a goal completes — verified external state, not the
//! reasoning engine's claim.
//!
//! ## Key components
//!
//! - [`CiMonitor`] — session table, arm/cancel/poll
//! - [`StatusProvider`] / [`GhStatusProvider`] — status source (gh CLI in
//!   production, in-memory fakes in tests)
//! - [`PollOutcome`] / [`PollStatus`] — per-poll results
//!
//! Terminal sessions stay cached so repeated polls are no-ops and a
//! finished branch cannot be re-armed.

pub mod error;
pub mod monitor;
pub mod provider;
pub mod session;

pub use error::MonitorError;
pub use monitor::CiMonitor;
pub use provider::{GhStatusProvider, PrSnapshot, PrState, StatusProvider};
pub use session::{PollOutcome, PollSession, PollStatus};
