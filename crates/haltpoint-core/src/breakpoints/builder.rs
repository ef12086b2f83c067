//! # Breakpoint Builder
//!
//! Builder pattern for configuring breakpoints before installation.
//!
//! This module provides a fluent API for configuring breakpoints with
//! conditions, monitors, filters, hit counts and suspend policies before
//! handing them to a [`BreakpointManager`].

use crate::breakpoints::group::GroupId;
use crate::breakpoints::{Breakpoint, BreakpointId, BreakpointKind, Condition, Monitor};
use crate::error::Result;
use crate::manager::BreakpointManager;
use crate::names::ClassPattern;
use crate::types::SuspendPolicy;

/// Builder for configuring breakpoints before installation.
///
/// Filters are checked against the kind in [`BreakpointBuilder::build`], so a
/// chain can be written without intermediate error handling.
///
/// ## Example
///
/// ```rust
/// use haltpoint_core::breakpoints::builder::BreakpointBuilder;
/// use haltpoint_core::breakpoints::BreakpointKind;
/// use haltpoint_core::manager::BreakpointManager;
/// use haltpoint_core::names::ClassPattern;
///
/// let manager = BreakpointManager::new();
/// let id = BreakpointBuilder::new(BreakpointKind::Line {
///     class: ClassPattern::parse("com.acme.Foo").unwrap(),
///     line: 42,
/// })
/// .skip(5) // Resume silently the first 5 times
/// .with_condition("count > 10") // Only stop when count > 10
/// .for_thread("worker")
/// .install(&manager)?;
/// assert_eq!(id.raw(), 1);
/// # Ok::<(), haltpoint_core::error::BreakpointError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BreakpointBuilder
{
    breakpoint: Breakpoint,
    class_filter: Option<ClassPattern>,
    thread_filter: Option<String>,
}

impl BreakpointBuilder
{
    /// Create a builder for a breakpoint of the given kind.
    #[must_use]
    pub fn new(kind: BreakpointKind) -> Self
    {
        Self::from_breakpoint(Breakpoint::new(kind))
    }

    /// Continue configuring an existing (unadded) breakpoint.
    #[must_use]
    pub fn from_breakpoint(breakpoint: Breakpoint) -> Self
    {
        let class_filter = breakpoint.class_filter.clone();
        let thread_filter = breakpoint.thread_filter.clone();
        Self {
            breakpoint,
            class_filter,
            thread_filter,
        }
    }

    /// Resume silently for the first `count` gate passes.
    ///
    /// This is useful for debugging loops or frequently-called methods.
    #[must_use]
    pub fn skip(mut self, count: u32) -> Self
    {
        self.breakpoint.skip_count = count;
        self
    }

    /// Expire after `count` gate passes.
    #[must_use]
    pub fn expire(mut self, count: u32) -> Self
    {
        self.breakpoint.expire_count = count;
        self
    }

    /// Remove the breakpoint once it expires.
    #[must_use]
    pub fn delete_on_expire(mut self) -> Self
    {
        self.breakpoint.delete_on_expire = true;
        self
    }

    /// Add a condition that must be true for the breakpoint to stop.
    ///
    /// Conditions are evaluated in the order they were added; the first one
    /// that is false resumes the target.
    #[must_use]
    pub fn with_condition(mut self, expression: impl Into<String>) -> Self
    {
        self.breakpoint.conditions.push(Condition::expression(expression));
        self
    }

    /// Add an expression monitor, evaluated and logged on every hit.
    #[must_use]
    pub fn with_monitor(mut self, expression: impl Into<String>) -> Self
    {
        self.breakpoint.monitors.push(Monitor::expression(expression));
        self
    }

    /// Restrict the breakpoint to the thread with this name.
    #[must_use]
    pub fn for_thread(mut self, name: impl Into<String>) -> Self
    {
        self.thread_filter = Some(name.into());
        self
    }

    /// Restrict the breakpoint to classes matching `pattern`.
    #[must_use]
    pub fn with_class_filter(mut self, pattern: ClassPattern) -> Self
    {
        self.class_filter = Some(pattern);
        self
    }

    /// Set the suspend policy.
    #[must_use]
    pub fn suspend(mut self, policy: SuspendPolicy) -> Self
    {
        self.breakpoint.suspend_policy = policy;
        self
    }

    /// Add the breakpoint in the disabled state.
    #[must_use]
    pub fn disabled(mut self) -> Self
    {
        self.breakpoint.enabled = false;
        self
    }

    /// Produce the breakpoint.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::FilterNotSupported`](crate::error::BreakpointError::FilterNotSupported)
    /// when a filter was requested that the kind cannot carry.
    pub fn build(self) -> Result<Breakpoint>
    {
        let mut breakpoint = self.breakpoint;
        breakpoint.set_class_filter(self.class_filter)?;
        breakpoint.set_thread_filter(self.thread_filter)?;
        Ok(breakpoint)
    }

    /// Build the breakpoint and add it to the manager's default group.
    ///
    /// # Errors
    ///
    /// Everything [`BreakpointBuilder::build`] and
    /// [`BreakpointManager::add_breakpoint`] can fail with.
    pub fn install(self, manager: &BreakpointManager) -> Result<BreakpointId>
    {
        manager.add_breakpoint(self.build()?)
    }

    /// Build the breakpoint and add it to `group`.
    ///
    /// # Errors
    ///
    /// Everything [`BreakpointBuilder::build`] and
    /// [`BreakpointManager::add_breakpoint_to`] can fail with.
    pub fn install_in(self, manager: &BreakpointManager, group: GroupId) -> Result<BreakpointId>
    {
        manager.add_breakpoint_to(self.build()?, group)
    }

    /// Get the configured kind.
    #[must_use]
    pub const fn kind(&self) -> &BreakpointKind
    {
        &self.breakpoint.kind
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::error::BreakpointError;

    #[test]
    fn test_builder_applies_settings()
    {
        let bp = BreakpointBuilder::new(BreakpointKind::Trace {
            on_enter: true,
            on_exit: true,
        })
        .with_class_filter(ClassPattern::parse("com.acme.*").unwrap())
        .for_thread("main")
        .with_monitor("depth")
        .expire(3)
        .delete_on_expire()
        .build()
        .unwrap();
        assert_eq!(bp.thread_filter(), Some("main"));
        assert_eq!(bp.monitors().len(), 1);
        assert_eq!(bp.expire_count(), 3);
        assert!(bp.delete_on_expire());
    }

    #[test]
    fn test_builder_rejects_unsupported_filter()
    {
        let result = BreakpointBuilder::new(BreakpointKind::Thread {
            on_start: true,
            on_death: false,
        })
        .with_class_filter(ClassPattern::Any)
        .build();
        assert!(matches!(result, Err(BreakpointError::FilterNotSupported { kind: "thread", .. })));
    }
}
