//! # haltpoint-core
//!
//! Breakpoint definition, grouping and conditional event gating for a
//! Java-style debugger.
//!
//! This crate provides the breakpoint engine that sits between a debugger
//! front end and a debug target, including:
//! - Parsing breakpoint specs and commands into typed breakpoints
//! - A numbered breakpoint tree with nestable, independently enabled groups
//! - Resolving breakpoints against classes as they load
//! - Gating target notifications through conditions, monitors, skip and
//!   expire counts and suspend policies
//! - Saving and restoring breakpoints across sessions
//!
//! ## Targets
//!
//! The engine talks to the target only through the
//! [`EventSource`](target::EventSource) and [`Evaluator`](target::Evaluator)
//! traits. [`target::memory::MemoryTarget`] implements both in memory for
//! tests and replays; a JDWP client would implement them for a live VM.

pub mod breakpoints;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod factory;
pub mod gate;
pub mod manager;
pub mod names;
pub mod persist;
pub mod prelude;
mod resolve;
pub mod session;
pub mod target;
pub mod types;

pub use breakpoints::{Breakpoint, BreakpointId, BreakpointKind, BreakpointState, GroupId};
// Re-export commonly used types
pub use error::{BreakpointError, Result};
pub use manager::{BreakpointManager, EventOutcome};
pub use session::Session;
