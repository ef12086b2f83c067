//! Common module for library exports

pub use crate::breakpoints::builder::BreakpointBuilder;
pub use crate::breakpoints::{
    Breakpoint, BreakpointId, BreakpointKind, BreakpointState, Condition, GroupId, Monitor,
};
pub use crate::config::EngineConfig;
pub use crate::error::{BreakpointError, EvaluationError, Result, SubscriptionError};
pub use crate::events::{BreakpointEvent, BreakpointListener, ChannelListener};
pub use crate::factory::{BreakpointFactory, DebuggingContext};
pub use crate::manager::{BreakpointManager, EventOutcome};
pub use crate::names::ClassPattern;
pub use crate::session::Session;
pub use crate::target::{EventSource, Evaluator, TargetEvent};
pub use crate::types::{Location, ReferenceType, SuspendPolicy, ThreadId, Value};
