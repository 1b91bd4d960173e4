//! # mk-tools
//!
//! Sandboxed tool dispatch for Mako.
//!
//! Heterogeneous capabilities (git, GitHub queries, shell inspection) sit
//! behind one [`Capability`] trait and are invoked through the
//! [`ToolDispatcher`]: sandbox check before execution, per-call timeout,
//! and unconditional outcome recording into the reliability tracker.
//!
//! ## Key components
//!
//! - [`Capability`] — one shape for every tool (params schema in, JSON out)
//! - [`ToolDispatcher`] — registry + dispatch + reliability-biased ordering
//! - [`Sandbox`] — the filesystem boundary dispatched calls stay within
//! - [`builtin`] — the shipped git/gh/shell capability set

pub mod builtin;
pub mod capability;
pub mod dispatcher;
pub mod error;
pub mod sandbox;

pub use capability::{parse_params, schema_for, Capability};
pub use dispatcher::{EvalPolicy, ToolDispatcher};
pub use error::ToolError;
pub use sandbox::Sandbox;
