//! # Types
//!
//! Target-agnostic types used throughout the breakpoint engine.
//!
//! These types describe what the engine knows about the debug target (threads,
//! loaded classes, code locations and evaluated values) without tying the rest
//! of the crate to a particular wire protocol.

pub mod reference;
pub mod thread;
pub mod value;

// Re-export all public types
pub use reference::{FieldInfo, Location, MethodInfo, ReferenceType};
pub use thread::{SuspendPolicy, ThreadId};
pub use value::Value;
