//! # Error Types
//!
//! General error handling for the breakpoint engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::breakpoints::BreakpointId;
use crate::breakpoints::group::GroupId;

/// Main error type for breakpoint operations
///
/// This enum represents all the ways defining, resolving or registering a
/// breakpoint can fail. Only spec errors and lookup errors are fatal to the
/// call that raised them; the other categories leave the breakpoint in place
/// so it can be retried later.
///
/// ## Error Categories
///
/// 1. **Spec errors**: MalformedClassName, MalformedMemberName, AmbiguousClassSpec,
///    AmbiguousMethod, InvalidLineNumber, MissingSpecification, FilterNotSupported,
///    InvalidCommand
/// 2. **Resolution errors**: AbsentInformation, NoSuchMethod, NoSuchField, NoCodeAtLine
/// 3. **Subscription errors**: Subscription (wraps [`SubscriptionError`])
/// 4. **Lookup errors**: BreakpointNotFound, GroupNotFound, DuplicateGroupName,
///    DefaultGroupImmovable, InvalidGroupMove
/// 5. **Persistence errors**: Persistence, Io
///
/// Evaluation errors never surface through this type; see [`EvaluationError`].
#[derive(Error, Debug)]
pub enum BreakpointError
{
    /// The class name is not a valid (optionally wildcarded) Java class name
    ///
    /// Raised before any target lookup is attempted, because an invalid name
    /// can never match a class loaded later.
    #[error("Malformed class name: {0}")]
    MalformedClassName(String),

    /// The method, field or argument type name is not a valid identifier
    #[error("Malformed member name: {0}")]
    MalformedMemberName(String),

    /// More than one loaded class matches a partial class name
    ///
    /// The candidates are reported so the caller can ask the user to pick one.
    /// An empty candidate list means the input omitted the class entirely and
    /// there was no current location to fall back on.
    #[error("Ambiguous class specification '{spec}' ({} candidates)", candidates.len())]
    AmbiguousClassSpec
    {
        /// The class portion of the user's specification
        spec: String,
        /// Fully qualified names of the matching loaded classes
        candidates: Vec<String>,
    },

    /// The method name matches several overloads and no argument list was given
    #[error("Ambiguous method {class}.{method} ({} overloads)", candidates.len())]
    AmbiguousMethod
    {
        /// Class declaring the overloads
        class: String,
        /// Method name as given by the user
        method: String,
        /// Signatures of the overloads, formatted as `name(Type,Type)`
        candidates: Vec<String>,
    },

    /// Line numbers are 1-based
    #[error("Invalid line number: {0}")]
    InvalidLineNumber(String),

    /// The specification string was empty
    #[error("Missing breakpoint specification")]
    MissingSpecification,

    /// The breakpoint kind cannot carry the requested filter
    #[error("Breakpoint {kind} does not support {filter} filters")]
    FilterNotSupported
    {
        /// Kind label of the breakpoint
        kind: &'static str,
        /// `class` or `thread`
        filter: &'static str,
    },

    /// A breakpoint command could not be interpreted
    #[error("Invalid breakpoint command: {0}")]
    InvalidCommand(String),

    /// The resolved class carries no line number information
    #[error("Line number information absent for class {class}")]
    AbsentInformation
    {
        /// Fully qualified class name
        class: String,
    },

    /// No method with the given name (and argument types) exists in the class
    #[error("No method {method} in class {class}")]
    NoSuchMethod
    {
        /// Fully qualified class name
        class: String,
        /// Method name, with the argument list if one was given
        method: String,
    },

    /// No field with the given name exists in the class
    #[error("No field {field} in class {class}")]
    NoSuchField
    {
        /// Fully qualified class name
        class: String,
        /// Field name
        field: String,
    },

    /// The class exists but no executable code maps to the requested line
    #[error("No code at line {line} in class {class}")]
    NoCodeAtLine
    {
        /// Fully qualified class name
        class: String,
        /// Requested line
        line: u32,
    },

    /// The event source rejected a subscription for a breakpoint
    ///
    /// The breakpoint stays in its group, unresolved, and is retried on the
    /// next class load or reconnect.
    #[error("Subscription for breakpoint {id} failed: {source}")]
    Subscription
    {
        /// Breakpoint whose subscription failed
        id: BreakpointId,
        /// Reason reported by the event source
        #[source]
        source: SubscriptionError,
    },

    /// No breakpoint exists for the given display number.
    #[error("No breakpoint with number {0}")]
    BreakpointNotFound(u32),

    /// No group exists for the given identifier.
    #[error("No breakpoint group with id {0}")]
    GroupNotFound(u32),

    /// Group names are unique among siblings
    #[error("A group named '{0}' already exists here")]
    DuplicateGroupName(String),

    /// The root group can be neither removed nor moved
    #[error("The default group cannot be removed or moved")]
    DefaultGroupImmovable,

    /// A group cannot be moved underneath itself
    #[error("Cannot move group {group} into its own descendant {target}")]
    InvalidGroupMove
    {
        /// Group being moved
        group: GroupId,
        /// Requested new parent
        target: GroupId,
    },

    /// The event dispatcher no longer accepts notifications
    #[error("Event dispatcher is shut down")]
    DispatcherClosed,

    /// The snapshot was written by an incompatible version
    #[error("Unsupported breakpoint file version {0}")]
    UnsupportedVersion(u32),

    /// Breakpoint definitions could not be (de)serialized
    #[error("Persistence error: {0}")]
    Persistence(#[from] serde_json::Error),

    /// I/O error while saving or loading breakpoints
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an [`EventSource`](crate::target::EventSource) when
/// registering or removing a subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError
{
    /// The target is no longer connected
    #[error("target disconnected")]
    Disconnected,

    /// The target does not support this kind of request
    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// The handle does not refer to a live subscription
    #[error("invalid subscription handle {0}")]
    InvalidHandle(u64),

    /// Any other refusal by the target
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Failure reported by the predicate evaluator, or raised while interpreting
/// its result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError
{
    /// The expression failed to parse or threw while running
    #[error("evaluation of '{expression}' failed: {message}")]
    Failed
    {
        /// Expression text
        expression: String,
        /// Evaluator message
        message: String,
    },

    /// A condition produced something other than a boolean
    #[error("condition '{expression}' did not produce a boolean (got {value})")]
    NotBoolean
    {
        /// Expression text
        expression: String,
        /// Rendered value
        value: String,
    },

    /// The event carried no thread to evaluate against
    #[error("no thread available to evaluate '{0}'")]
    NoThread(String),

    /// The target went away mid-evaluation
    #[error("target disconnected")]
    Disconnected,
}

/// Convenience type alias for `Result<T, BreakpointError>`
///
/// ```rust
/// use haltpoint_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, BreakpointError>;
