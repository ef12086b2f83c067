//! # Target
//!
//! The seams between the engine and the live debug target.
//!
//! ## Event Source
//!
//! [`EventSource`] registers subscriptions and delivers [`TargetEvent`]s for
//! them. Filters travel with the request and are applied by the source itself;
//! the engine never re-checks class or thread names.
//!
//! ## Predicate Evaluator
//!
//! [`Evaluator`] evaluates condition and monitor expressions in a suspended
//! frame. It is opaque to the engine.
//!
//! ## Suspension Model
//!
//! When a subscribed event fires, the source pauses the target according to
//! the request's suspend policy before delivering it. The engine then either
//! leaves the target paused (a stop) or calls [`EventSource::resume`].

pub mod memory;

use std::fmt;

use crate::error::{EvaluationError, SubscriptionError};
use crate::names::ClassPattern;
use crate::types::{Location, ReferenceType, SuspendPolicy, ThreadId, Value};

/// Identifier of a live subscription, issued by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle
{
    /// Create a new handle from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self
    {
        Self(value)
    }

    /// Get the raw numeric representation.
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// What a subscription matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSpec
{
    /// Execution reaching a resolved location
    Location(Location),
    /// Exceptions of a matching class
    Exception
    {
        /// Exception class pattern
        class: ClassPattern,
        /// Report caught exceptions
        caught: bool,
        /// Report uncaught exceptions
        uncaught: bool,
    },
    /// Reads of a field
    FieldAccess
    {
        /// Declaring class
        class: String,
        /// Field name
        field: String,
    },
    /// Writes of a field
    FieldModify
    {
        /// Declaring class
        class: String,
        /// Field name
        field: String,
    },
    /// Any thread starting
    ThreadStart,
    /// Any thread ending
    ThreadDeath,
    /// Any method being entered
    MethodEntry,
    /// Any method returning
    MethodExit,
    /// Classes matching a pattern being prepared
    ClassPrepare(ClassPattern),
    /// Classes matching a pattern being unloaded
    ClassUnload(ClassPattern),
}

/// Everything the event source needs to register a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest
{
    /// Match rule
    pub spec: MatchSpec,
    /// Restrict to events whose class matches
    pub class_filter: Option<ClassPattern>,
    /// Restrict to events on the thread with this name
    pub thread_filter: Option<String>,
    /// How much of the target to pause when the event fires
    pub suspend_policy: SuspendPolicy,
}

impl SubscriptionRequest
{
    /// A request with no filters.
    #[must_use]
    pub const fn new(spec: MatchSpec, suspend_policy: SuspendPolicy) -> Self
    {
        Self {
            spec,
            class_filter: None,
            thread_filter: None,
            suspend_policy,
        }
    }
}

/// What happened in the target.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail
{
    /// A resolved location was reached
    Location(Location),
    /// An exception was thrown
    Exception
    {
        /// Exception class
        class: String,
        /// Throw location, when known
        location: Option<Location>,
        /// Whether a handler will catch it
        caught: bool,
    },
    /// A field was read
    FieldAccess
    {
        /// Declaring class
        class: String,
        /// Field name
        field: String,
        /// Access location
        location: Option<Location>,
    },
    /// A field was written
    FieldModify
    {
        /// Declaring class
        class: String,
        /// Field name
        field: String,
        /// Value being stored
        value: Value,
    },
    /// A thread started
    ThreadStart
    {
        /// Thread name
        name: String,
    },
    /// A thread ended
    ThreadDeath
    {
        /// Thread name
        name: String,
    },
    /// A method was entered
    MethodEntry(Location),
    /// A method returned
    MethodExit(Location),
    /// A class was prepared
    ClassPrepare(ReferenceType),
    /// A class was unloaded
    ClassUnload
    {
        /// Class name
        class: String,
    },
}

impl EventDetail
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::Location(location) => format!("reached {location}"),
            Self::Exception { class, location, caught } => {
                let kind = if *caught { "caught" } else { "uncaught" };
                match location {
                    Some(location) => format!("{kind} {class} thrown at {location}"),
                    None => format!("{kind} {class} thrown"),
                }
            }
            Self::FieldAccess { class, field, .. } => format!("{class}.{field} accessed"),
            Self::FieldModify { class, field, value } => format!("{class}.{field} set to {value}"),
            Self::ThreadStart { name } => format!("thread {name} started"),
            Self::ThreadDeath { name } => format!("thread {name} ended"),
            Self::MethodEntry(location) => format!("entered {location}"),
            Self::MethodExit(location) => format!("exited {location}"),
            Self::ClassPrepare(class) => format!("class {} prepared", class.name),
            Self::ClassUnload { class } => format!("class {class} unloaded"),
        }
    }
}

/// A notification delivered for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetEvent
{
    /// Subscription that matched
    pub handle: SubscriptionHandle,
    /// Thread the event happened on, when it has one
    pub thread: Option<ThreadId>,
    /// How the target was paused before delivery
    pub suspended: SuspendPolicy,
    /// What happened
    pub detail: EventDetail,
}

/// The live debug target, as far as breakpoints are concerned.
pub trait EventSource: Send + Sync
{
    /// Whether the target is still attached.
    fn is_connected(&self) -> bool;

    /// Classes currently loaded in the target.
    fn classes(&self) -> Vec<ReferenceType>;

    /// Register a subscription.
    ///
    /// # Errors
    ///
    /// Fails when the target is gone or refuses the request.
    fn subscribe(&self, request: &SubscriptionRequest) -> Result<SubscriptionHandle, SubscriptionError>;

    /// Release a subscription.
    ///
    /// # Errors
    ///
    /// Fails when the handle is unknown or the target is gone.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscriptionError>;

    /// Resume whatever the delivery of `event` paused.
    ///
    /// # Errors
    ///
    /// Fails when the target is gone.
    fn resume(&self, event: &TargetEvent) -> Result<(), SubscriptionError>;
}

/// Expression evaluation in a suspended frame.
pub trait Evaluator: Send + Sync
{
    /// Evaluate `expression` in frame `frame` of `thread`.
    ///
    /// # Errors
    ///
    /// Any failure to parse or run the expression.
    fn evaluate(&self, expression: &str, thread: ThreadId, frame: usize) -> Result<Value, EvaluationError>;
}
