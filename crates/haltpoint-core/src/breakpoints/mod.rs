//! Breakpoint definitions and bookkeeping.
//!
//! A [`Breakpoint`] pairs an immutable [`BreakpointKind`] (what to match) with
//! the mutable settings that shape how a match is handled: filters,
//! conditions, monitors, suspend policy and hit counting. The manager owns the
//! live subscriptions; this module only tracks their handles so they can be
//! released again.

pub mod builder;
pub mod condition;
pub mod group;
pub mod monitor;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use self::condition::Condition;
pub use self::group::{GroupId, GroupMember, GroupNode};
pub use self::monitor::Monitor;
pub use self::store::BreakpointStore;
use crate::error::{BreakpointError, Result};
use crate::factory::parse::is_reserved_word;
use crate::names::ClassPattern;
use crate::target::SubscriptionHandle;
use crate::types::SuspendPolicy;

/// Display number of a breakpoint.
///
/// Numbers start at 1, increase strictly in insertion order and are never
/// handed out twice by the same manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(u32);

impl BreakpointId
{
    /// Create a new identifier from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self
    {
        Self(value)
    }

    /// Get the raw numeric representation (useful for logging / errors).
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for BreakpointId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// What a breakpoint matches. Fixed for the lifetime of the breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakpointKind
{
    /// A source line in a class
    Line
    {
        /// Class name or wildcard pattern
        class: ClassPattern,
        /// 1-based source line
        line: u32,
    },
    /// The first line of a method
    Method
    {
        /// Class name or wildcard pattern
        class: ClassPattern,
        /// Method name
        method: String,
        /// Argument types; `None` matches every overload
        arguments: Option<Vec<String>>,
    },
    /// An exception being thrown
    Exception
    {
        /// Exception class name or pattern (`*` for any)
        class: ClassPattern,
        /// Report exceptions that will be caught
        caught: bool,
        /// Report exceptions with no handler
        uncaught: bool,
    },
    /// Access or modification of a field
    Watch
    {
        /// Class declaring the field
        class: ClassPattern,
        /// Field name
        field: String,
        /// Report reads
        on_access: bool,
        /// Report writes
        on_modify: bool,
    },
    /// Thread start or death; the thread filter names the thread
    Thread
    {
        /// Report thread starts
        on_start: bool,
        /// Report thread deaths
        on_death: bool,
    },
    /// Method entry or exit tracing, restricted by the filters
    Trace
    {
        /// Report method entry
        on_enter: bool,
        /// Report method exit
        on_exit: bool,
    },
    /// Classes being prepared or unloaded
    ClassLifecycle
    {
        /// Class name or pattern
        class: ClassPattern,
        /// Report class prepare
        on_prepare: bool,
        /// Report class unload
        on_unload: bool,
    },
}

impl BreakpointKind
{
    /// Short label for messages.
    #[must_use]
    pub const fn label(&self) -> &'static str
    {
        match self {
            Self::Line { .. } => "line",
            Self::Method { .. } => "method",
            Self::Exception { .. } => "exception",
            Self::Watch { .. } => "watch",
            Self::Thread { .. } => "thread",
            Self::Trace { .. } => "trace",
            Self::ClassLifecycle { .. } => "class",
        }
    }

    /// Whether a class filter may be attached.
    #[must_use]
    pub const fn can_filter_class(&self) -> bool
    {
        matches!(
            self,
            Self::Exception { .. } | Self::Watch { .. } | Self::Trace { .. } | Self::ClassLifecycle { .. }
        )
    }

    /// Whether a thread filter may be attached.
    #[must_use]
    pub const fn can_filter_thread(&self) -> bool
    {
        matches!(
            self,
            Self::Line { .. } | Self::Exception { .. } | Self::Watch { .. } | Self::Thread { .. } | Self::Trace { .. }
        )
    }

    /// Whether the kind must be bound to a loaded class before it can be
    /// subscribed.
    #[must_use]
    pub const fn needs_resolution(&self) -> bool
    {
        matches!(self, Self::Line { .. } | Self::Method { .. } | Self::Watch { .. })
    }

    /// Trace breakpoints only run monitors and never stop.
    #[must_use]
    pub const fn is_trace(&self) -> bool
    {
        matches!(self, Self::Trace { .. })
    }

    /// Class the kind has to be resolved against, if any.
    #[must_use]
    pub const fn class_pattern(&self) -> Option<&ClassPattern>
    {
        match self {
            Self::Line { class, .. }
            | Self::Method { class, .. }
            | Self::Exception { class, .. }
            | Self::Watch { class, .. }
            | Self::ClassLifecycle { class, .. } => Some(class),
            Self::Thread { .. } | Self::Trace { .. } => None,
        }
    }
}

/// Externally visible state of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointState
{
    /// Disabled by the user, by a disabled ancestor group, or expired
    Disabled,
    /// Enabled but not bound to the target yet
    Unresolved,
    /// Enabled and subscribed with the target
    Resolved,
}

impl fmt::Display for BreakpointState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Unresolved => write!(f, "unresolved"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Connection dependent state. Never persisted.
#[derive(Debug, Clone, Default)]
pub(crate) struct Runtime
{
    pub(crate) handles: SmallVec<[SubscriptionHandle; 2]>,
    pub(crate) prepare_handle: Option<SubscriptionHandle>,
    pub(crate) hit_count: u32,
    pub(crate) resolve_error: Option<String>,
}

/// A single stop condition.
///
/// Breakpoints are built by the factory (or [`builder::BreakpointBuilder`])
/// and handed to the manager, which assigns the number and owns them from
/// then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint
{
    pub(crate) number: Option<BreakpointId>,
    pub(crate) kind: BreakpointKind,
    pub(crate) enabled: bool,
    #[serde(default)]
    pub(crate) suspend_policy: SuspendPolicy,
    #[serde(skip)]
    pub(crate) group: GroupId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) class_filter: Option<ClassPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) thread_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) monitors: Vec<Monitor>,
    #[serde(default)]
    pub(crate) skip_count: u32,
    #[serde(default)]
    pub(crate) expire_count: u32,
    #[serde(default)]
    pub(crate) delete_on_expire: bool,
    #[serde(skip)]
    pub(crate) runtime: Runtime,
}

impl Breakpoint
{
    /// A new, enabled, unnumbered breakpoint of the given kind.
    ///
    /// Trace breakpoints default to [`SuspendPolicy::None`]; everything else
    /// suspends all threads.
    #[must_use]
    pub fn new(kind: BreakpointKind) -> Self
    {
        let suspend_policy = if kind.is_trace() { SuspendPolicy::None } else { SuspendPolicy::All };
        Self {
            number: None,
            kind,
            enabled: true,
            suspend_policy,
            group: GroupId::DEFAULT,
            class_filter: None,
            thread_filter: None,
            conditions: Vec::new(),
            monitors: Vec::new(),
            skip_count: 0,
            expire_count: 0,
            delete_on_expire: false,
            runtime: Runtime::default(),
        }
    }

    /// Display number, `None` until the breakpoint is added to a manager.
    #[must_use]
    pub const fn number(&self) -> Option<BreakpointId>
    {
        self.number
    }

    /// What the breakpoint matches.
    #[must_use]
    pub const fn kind(&self) -> &BreakpointKind
    {
        &self.kind
    }

    /// The breakpoint's own enabled flag. See the manager for effective state.
    #[must_use]
    pub const fn is_enabled(&self) -> bool
    {
        self.enabled
    }

    /// Suspend policy applied when the gate passes.
    #[must_use]
    pub const fn suspend_policy(&self) -> SuspendPolicy
    {
        self.suspend_policy
    }

    /// Owning group.
    #[must_use]
    pub const fn group(&self) -> GroupId
    {
        self.group
    }

    #[must_use]
    pub const fn class_filter(&self) -> Option<&ClassPattern>
    {
        self.class_filter.as_ref()
    }

    #[must_use]
    pub fn thread_filter(&self) -> Option<&str>
    {
        self.thread_filter.as_deref()
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition]
    {
        &self.conditions
    }

    #[must_use]
    pub fn monitors(&self) -> &[Monitor]
    {
        &self.monitors
    }

    /// Number of gate passes that resume silently before the first stop.
    #[must_use]
    pub const fn skip_count(&self) -> u32
    {
        self.skip_count
    }

    /// Number of gate passes after which the breakpoint expires (0 = never).
    #[must_use]
    pub const fn expire_count(&self) -> u32
    {
        self.expire_count
    }

    #[must_use]
    pub const fn delete_on_expire(&self) -> bool
    {
        self.delete_on_expire
    }

    /// Gate passes since the target connected (or the last reset).
    #[must_use]
    pub const fn hit_count(&self) -> u32
    {
        self.runtime.hit_count
    }

    /// Whether at least one live subscription exists.
    #[must_use]
    pub fn is_resolved(&self) -> bool
    {
        !self.runtime.handles.is_empty()
    }

    /// Last resolution failure, kept while the breakpoint stays unresolved.
    #[must_use]
    pub fn resolve_error(&self) -> Option<&str>
    {
        self.runtime.resolve_error.as_deref()
    }

    /// Whether the expire count has been reached.
    #[must_use]
    pub const fn is_expired(&self) -> bool
    {
        self.expire_count > 0 && self.runtime.hit_count >= self.expire_count
    }

    /// Whether the current gate pass falls inside the skip window.
    #[must_use]
    pub const fn is_skipping(&self) -> bool
    {
        self.skip_count > 0 && self.runtime.hit_count <= self.skip_count
    }

    /// Whether a gate pass has anything to evaluate.
    #[must_use]
    pub fn has_gate_work(&self) -> bool
    {
        !self.conditions.is_empty() || !self.monitors.is_empty()
    }

    pub(crate) fn set_class_filter(&mut self, filter: Option<ClassPattern>) -> Result<()>
    {
        if filter.is_some() && !self.kind.can_filter_class() {
            return Err(BreakpointError::FilterNotSupported {
                kind: self.kind.label(),
                filter: "class",
            });
        }
        self.class_filter = filter;
        Ok(())
    }

    pub(crate) fn set_thread_filter(&mut self, filter: Option<String>) -> Result<()>
    {
        if filter.is_some() && !self.kind.can_filter_thread() {
            return Err(BreakpointError::FilterNotSupported {
                kind: self.kind.label(),
                filter: "thread",
            });
        }
        self.thread_filter = filter.filter(|name| !name.is_empty());
        Ok(())
    }

    pub(crate) fn reset_runtime(&mut self)
    {
        self.runtime = Runtime::default();
    }

    /// Render the breakpoint in the command grammar.
    ///
    /// Feeding the result back through
    /// [`BreakpointFactory::create_from_command`](crate::factory::BreakpointFactory::create_from_command)
    /// yields an equivalent breakpoint.
    #[must_use]
    pub fn describe(&self) -> String
    {
        let mut parts: Vec<String> = Vec::new();
        if let Some(keyword) = self.suspend_policy.keyword() {
            // Trace breakpoints default to `go`; only spell out a deviation.
            if !(self.kind.is_trace() && self.suspend_policy == SuspendPolicy::None) {
                parts.push(keyword.to_string());
            }
        } else if self.kind.is_trace() {
            parts.push("all".to_string());
        }
        parts.push(self.describe_kind());
        if let Some(filter) = &self.class_filter {
            parts.push(format!("c:{filter}"));
        }
        if let Some(filter) = &self.thread_filter {
            if !matches!(self.kind, BreakpointKind::Thread { .. }) {
                parts.push(format!("t:{filter}"));
            }
        }
        parts.join(" ")
    }

    fn describe_kind(&self) -> String
    {
        fn flags(pairs: &[(bool, &str)]) -> String
        {
            pairs
                .iter()
                .filter(|(set, _)| *set)
                .map(|(_, word)| *word)
                .collect::<Vec<_>>()
                .join(" ")
        }

        match &self.kind {
            BreakpointKind::Line { class, line } => format!("{class}:{line}"),
            BreakpointKind::Method { class, method, arguments } => match arguments {
                Some(arguments) => format!("{class}.{method}({})", arguments.join(",")),
                None => format!("{class}.{method}"),
            },
            BreakpointKind::Exception { class, caught, uncaught } => {
                format!("{class} {}", flags(&[(*caught, "caught"), (*uncaught, "uncaught")]))
            }
            BreakpointKind::Watch {
                class,
                field,
                on_access,
                on_modify,
            } => format!("{class}.{field} {}", flags(&[(*on_access, "access"), (*on_modify, "modify")])),
            BreakpointKind::Thread { on_start, on_death } => {
                let events = flags(&[(*on_start, "start"), (*on_death, "death")]);
                match &self.thread_filter {
                    Some(name) if is_reserved_word(name) => format!("{events} t:{name}"),
                    Some(name) => format!("{name} {events}"),
                    None => events,
                }
            }
            BreakpointKind::Trace { on_enter, on_exit } => flags(&[(*on_enter, "enter"), (*on_exit, "exit")]),
            BreakpointKind::ClassLifecycle {
                class,
                on_prepare,
                on_unload,
            } => format!("{class} {}", flags(&[(*on_prepare, "prepare"), (*on_unload, "unload")])),
        }
    }
}

impl fmt::Display for Breakpoint
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.number {
            Some(number) => write!(f, "[{number}] {}", self.describe()),
            None => write!(f, "{}", self.describe()),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn pattern(text: &str) -> ClassPattern
    {
        ClassPattern::parse(text).unwrap()
    }

    #[test]
    fn test_filter_capabilities_follow_kind()
    {
        let mut line = Breakpoint::new(BreakpointKind::Line {
            class: pattern("Foo"),
            line: 10,
        });
        assert!(matches!(
            line.set_class_filter(Some(pattern("com.*"))),
            Err(BreakpointError::FilterNotSupported { filter: "class", .. })
        ));
        assert!(line.set_thread_filter(Some("main".to_string())).is_ok());

        let mut class = Breakpoint::new(BreakpointKind::ClassLifecycle {
            class: pattern("com.*"),
            on_prepare: true,
            on_unload: false,
        });
        assert!(class.set_thread_filter(Some("main".to_string())).is_err());
        assert!(class.set_thread_filter(None).is_ok());
    }

    #[test]
    fn test_describe_forms()
    {
        let mut watch = Breakpoint::new(BreakpointKind::Watch {
            class: pattern("com.acme.Foo"),
            field: "count".to_string(),
            on_access: false,
            on_modify: true,
        });
        watch.suspend_policy = SuspendPolicy::EventThread;
        watch.thread_filter = Some("worker".to_string());
        assert_eq!(watch.describe(), "thread com.acme.Foo.count modify t:worker");

        let mut thread = Breakpoint::new(BreakpointKind::Thread {
            on_start: true,
            on_death: true,
        });
        thread.thread_filter = Some("main".to_string());
        assert_eq!(thread.describe(), "main start death");
        thread.thread_filter = Some("go".to_string());
        assert_eq!(thread.describe(), "start death t:go");

        let trace = Breakpoint::new(BreakpointKind::Trace {
            on_enter: true,
            on_exit: false,
        });
        assert_eq!(trace.describe(), "enter");
        assert_eq!(trace.suspend_policy(), SuspendPolicy::None);

        let method = Breakpoint::new(BreakpointKind::Method {
            class: pattern("Foo"),
            method: "bar".to_string(),
            arguments: Some(vec!["int".to_string(), "String".to_string()]),
        });
        assert_eq!(method.describe(), "Foo.bar(int,String)");
    }

    #[test]
    fn test_skip_and_expire_windows()
    {
        let mut bp = Breakpoint::new(BreakpointKind::Line {
            class: pattern("Foo"),
            line: 1,
        });
        bp.skip_count = 2;
        bp.expire_count = 3;
        bp.runtime.hit_count = 2;
        assert!(bp.is_skipping());
        assert!(!bp.is_expired());
        bp.runtime.hit_count = 3;
        assert!(!bp.is_skipping());
        assert!(bp.is_expired());
    }
}
